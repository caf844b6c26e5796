//! Node lifecycle and geometry requests
//!
//! Adding and removing nodes, showing and hiding them, and client requests
//! that change a node's requested rect, flags or bar appearance.

use crate::agent::WindowUpdateType;
use crate::avoid_area::{AvoidAreaController, AvoidControlOp};
use crate::display::DisplayInfo;
use crate::error::{WmError, WmResult};
use crate::geometry::{Point, Rect, MAX_COORDINATE};
use crate::layout;
use crate::minimize::MinimizeReason;
use crate::window_node::{SystemBarProperty, WindowFlags, WindowId, WindowNode, WindowType};

use super::WindowNodeContainer;

impl WindowNodeContainer {
    /// Validate a parent id before a node is built for it
    pub fn check_parent(&self, parent: Option<WindowId>) -> WmResult<()> {
        let Some(parent_id) = parent else {
            return Ok(());
        };
        let parent = self
            .nodes
            .get(&parent_id)
            .ok_or_else(|| WmError::InvalidParam(format!("unknown parent {} on display {}", parent_id.0, self.display_id)))?;
        if parent.display_id != self.display_id {
            return Err(WmError::InvalidParam(format!(
                "parent {} is on display {}",
                parent_id.0, parent.display_id
            )));
        }
        Ok(())
    }

    /// Insert a hidden node on top of its bucket
    pub fn add_node(&mut self, parent: Option<WindowId>, mut node: WindowNode) -> WmResult<()> {
        check_rect(&node.request_rect)?;
        self.check_parent(parent)?;
        if self.nodes.contains_key(&node.id) {
            return Err(WmError::RepeatOperation(format!("window {} already exists", node.id.0)));
        }

        node.display_id = self.display_id;
        node.parent_id = parent;
        node.mode = layout::resolve_mode(node.requested_mode, node.mode_support);
        node.z_index = self.top_z(node.z_bucket) + 1;

        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            if parent.has_flag(WindowFlags::PARENT_LIMIT) {
                node.request_rect = node.request_rect.clamp_into(&parent.rect);
                node.rect = node.request_rect;
            }
            parent.children.push(node.id);
        }

        let id = node.id;
        tracing::debug!(
            display_id = self.display_id,
            window_id = id.0,
            window_type = ?node.window_type,
            parent = ?parent.map(|p| p.0),
            "window added"
        );
        self.nodes.insert(id, node);
        self.relayout(None);
        Ok(())
    }

    /// Remove a node and all of its descendants.
    ///
    /// Returns the removed ids, the node itself first.
    pub fn remove_node(&mut self, id: WindowId) -> WmResult<Vec<WindowId>> {
        let parent = self.get(id)?.parent_id;
        self.reject_divider(id, "destroy")?;

        if self.split.is_some_and(|split| split.slot_of(id).is_some()) {
            self.dissolve_split(None, Some(id));
        }

        let removed = self.subtree(id);
        let mut lost_focus = false;
        for removed_id in removed.iter().rev() {
            lost_focus |= self.drop_focus(*removed_id);
            self.avoid.withdraw(*removed_id);
            if let Some(node) = self.nodes.get_mut(removed_id) {
                if node.visible {
                    node.visible = false;
                    self.emit_status(*removed_id, WindowUpdateType::Removed);
                }
            }
            self.nodes.remove(removed_id);
            self.changes.destroyed.push(*removed_id);
        }

        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            parent.children.retain(|child| *child != id);
        }

        tracing::debug!(display_id = self.display_id, window_id = id.0, removed = removed.len(), "window removed");
        self.relayout(None);
        if lost_focus {
            self.focus_topmost();
        }
        Ok(removed)
    }

    /// `id` followed by its descendants, depth first
    fn subtree(&self, id: WindowId) -> Vec<WindowId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(&next) {
                out.push(next);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn show_node(&mut self, id: WindowId) -> WmResult<()> {
        let visible = self.get(id)?.visible;
        self.reject_divider(id, "show")?;
        if visible {
            return Ok(());
        }

        self.get_mut(id)?.visible = true;
        self.raise(id);
        self.apply_mode(id);
        self.relayout(Some(id));

        if let Some(node) = self.nodes.get(&id) {
            if AvoidAreaController::is_avoid_area_node(node) && self.avoid.avoid_control(node, AvoidControlOp::Add) {
                self.relayout(Some(id));
            }
        }

        self.emit_status(id, WindowUpdateType::Added);
        let focusable = self.nodes.get(&id).is_some_and(|node| node.focusable);
        tracing::debug!(display_id = self.display_id, window_id = id.0, "window shown");
        if focusable && self.config.focus_follows_show {
            self.set_focus(Some(id));
        }
        Ok(())
    }

    /// Hide a node together with its visible descendants
    pub fn hide_node(&mut self, id: WindowId) -> WmResult<()> {
        let visible = self.get(id)?.visible;
        self.reject_divider(id, "hide")?;
        if !visible {
            return Ok(());
        }

        if self.split.is_some_and(|split| split.slot_of(id).is_some()) {
            self.dissolve_split(None, Some(id));
        }

        let mut lost_focus = false;
        for hidden in self.subtree(id) {
            if !self.nodes.get(&hidden).is_some_and(|node| node.visible) {
                continue;
            }
            lost_focus |= self.drop_focus(hidden);
            self.avoid.withdraw(hidden);
            if let Some(node) = self.nodes.get_mut(&hidden) {
                node.visible = false;
            }
            self.emit_status(hidden, WindowUpdateType::Removed);
        }

        tracing::debug!(display_id = self.display_id, window_id = id.0, "window hidden");
        self.relayout(None);
        if lost_focus {
            self.focus_topmost();
        }
        Ok(())
    }

    pub fn move_to(&mut self, id: WindowId, x: i32, y: i32) -> WmResult<()> {
        check_point(Point::new(x, y))?;
        self.get(id)?;
        if self.is_divider(id) {
            return self.move_divider_to(x, y);
        }
        let node = self.get_mut(id)?;
        node.request_rect.x = x;
        node.request_rect.y = y;
        self.relayout(None);
        self.refresh_avoid(id);
        Ok(())
    }

    pub fn resize(&mut self, id: WindowId, width: u32, height: u32) -> WmResult<()> {
        if width == 0 || height == 0 {
            return Err(WmError::InvalidParam(format!("empty size {}x{}", width, height)));
        }
        let node = self.get(id)?;
        check_rect(&Rect::new(node.request_rect.x, node.request_rect.y, width, height))?;
        self.reject_divider(id, "resize")?;
        let node = self.get_mut(id)?;
        node.request_rect.width = width;
        node.request_rect.height = height;
        self.relayout(None);
        self.refresh_avoid(id);
        Ok(())
    }

    /// Re-register a contributor whose rect moved
    fn refresh_avoid(&mut self, id: WindowId) {
        if !self.avoid.contains(id) {
            return;
        }
        if let Some(node) = self.nodes.get(&id) {
            self.avoid.avoid_control(node, AvoidControlOp::Update);
        }
        self.relayout(None);
    }

    pub fn set_flags(&mut self, id: WindowId, flags: WindowFlags) -> WmResult<()> {
        self.reject_divider(id, "flag change")?;
        let node = self.get_mut(id)?;
        node.flags = flags;

        let contributes = node.visible && AvoidAreaController::is_avoid_area_node(node);
        if contributes && !self.avoid.contains(id) {
            if let Some(node) = self.nodes.get(&id) {
                self.avoid.avoid_control(node, AvoidControlOp::Add);
            }
        } else if !contributes {
            self.avoid.withdraw(id);
        }

        tracing::debug!(window_id = id.0, ?flags, "window flags set");
        self.relayout(None);
        Ok(())
    }

    /// Apply a client avoid-area request. Returns whether the node is an
    /// avoid contributor.
    pub fn avoid_control(&mut self, id: WindowId, op: AvoidControlOp) -> WmResult<bool> {
        self.reject_divider(id, "avoid control")?;
        let node = self.nodes.get(&id).ok_or_else(|| super::unknown_window(id))?;
        let applied = self.avoid.avoid_control(node, op);
        if applied {
            self.relayout(None);
        }
        Ok(applied)
    }

    pub fn set_starting_window_shown(&mut self, id: WindowId, shown: bool) -> WmResult<()> {
        self.get_mut(id)?.starting_window_shown = shown;
        Ok(())
    }

    pub fn set_system_bar_property(
        &mut self,
        id: WindowId,
        bar_type: WindowType,
        prop: SystemBarProperty,
    ) -> WmResult<()> {
        if !bar_type.is_system_bar() {
            return Err(WmError::InvalidParam(format!("{:?} is not a system bar", bar_type)));
        }
        self.get_mut(id)?.system_bar_props.insert(bar_type, prop);
        self.refresh_tints();
        Ok(())
    }

    /// Queue every visible main window for a user-initiated minimize
    pub fn minimize_all(&mut self) -> usize {
        let targets = self.visible_main_windows();
        for id in &targets {
            self.changes.minimize.push((*id, MinimizeReason::MinimizeAll));
        }
        targets.len()
    }

    /// Destroy every node (display removed). Returns the removed ids.
    pub fn destroy_all(&mut self) -> Vec<WindowId> {
        self.set_focus(None);
        self.split = None;
        self.drag = None;

        let ids: Vec<WindowId> = self.nodes.keys().copied().collect();
        for id in &ids {
            self.avoid.forget(*id);
            if let Some(node) = self.nodes.get_mut(id) {
                if node.visible {
                    node.visible = false;
                    self.emit_status(*id, WindowUpdateType::Removed);
                }
            }
        }
        self.nodes.clear();
        self.changes.destroyed.extend(ids.iter().copied());
        self.refresh_tints();
        tracing::info!(display_id = self.display_id, removed = ids.len(), "display container emptied");
        ids
    }

    /// New display geometry: reclassify avoid areas, reset the divider and
    /// lay everything out again
    pub fn update_display_rect(&mut self, info: DisplayInfo) {
        tracing::info!(display_id = self.display_id, rect = ?info.rect, "display geometry changed");
        self.display_rect = info.rect;
        self.avoid.set_display_rect(info.rect);
        if let Some(split) = self.split {
            let rect: Rect = layout::divider_rect(&self.limit_rect(), self.config.split_ratio, self.config.divider_width);
            if let Some(node) = self.nodes.get_mut(&split.divider) {
                node.request_rect = rect;
            }
            self.set_rect(split.divider, rect, None);
        }
        self.relayout(None);
    }
}

/// Reject a client rect whose edges could overflow
pub(crate) fn check_rect(rect: &Rect) -> WmResult<()> {
    if rect.in_bounds() {
        return Ok(());
    }
    Err(WmError::InvalidParam(format!("rect {:?} exceeds {} pixels", rect, MAX_COORDINATE)))
}

pub(crate) fn check_point(point: Point) -> WmResult<()> {
    if point.in_bounds() {
        return Ok(());
    }
    Err(WmError::InvalidParam(format!(
        "position ({}, {}) exceeds {} pixels",
        point.x, point.y, MAX_COORDINATE
    )))
}
