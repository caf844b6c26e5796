//! Focus management
//!
//! At most one node per display holds focus. Every change reports the old
//! node losing focus before the new node gaining it.

use crate::agent::{AgentEvent, WindowUpdateType};
use crate::error::{WmError, WmResult};
use crate::window_node::WindowId;

use super::WindowNodeContainer;

impl WindowNodeContainer {
    pub fn request_focus(&mut self, id: WindowId) -> WmResult<()> {
        let node = self.get(id)?;
        if !node.focusable {
            return Err(WmError::NotPermitted(format!("window {} is not focusable", id.0)));
        }
        if !node.visible {
            return Err(WmError::NotPermitted(format!("window {} is not visible", id.0)));
        }
        self.set_focus(Some(id));
        Ok(())
    }

    /// Move focus, reporting both sides of the change
    pub(super) fn set_focus(&mut self, target: Option<WindowId>) {
        if self.focused == target {
            return;
        }

        if let Some(previous) = self.focused.take() {
            if let Some(node) = self.nodes.get_mut(&previous) {
                node.focused = false;
            }
            self.emit_focus(previous, false);
        }

        let Some(id) = target else {
            tracing::debug!(display_id = self.display_id, "focus cleared");
            return;
        };
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.focused = true;
        self.focused = Some(id);
        tracing::debug!(display_id = self.display_id, window_id = id.0, "focus changed");
        self.emit_focus(id, true);
        self.emit_status(id, WindowUpdateType::Focused);
    }

    /// Hand focus to the topmost visible focusable node, if any
    pub(super) fn focus_topmost(&mut self) {
        let target = self.topmost(|node| node.focusable);
        self.set_focus(target);
    }

    /// Clear focus if `id` holds it. Returns whether it did.
    pub(super) fn drop_focus(&mut self, id: WindowId) -> bool {
        if self.focused != Some(id) {
            return false;
        }
        self.set_focus(None);
        true
    }

    fn emit_focus(&self, id: WindowId, focused: bool) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        self.emit(AgentEvent::FocusChanged {
            window_id: id,
            display_id: self.display_id,
            window_type: node.window_type,
            ability_token: node.ability_token,
            focused,
        });
    }
}
