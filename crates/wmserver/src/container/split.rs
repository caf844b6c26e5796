//! Mode arbitration, split pairs and the divider
//!
//! A visible main window's effective mode is decided here whenever it is
//! shown or its requested mode, mode mask or the display's layout mode
//! changes. Split mode pulls in a server-owned divider node; the pair
//! dissolves as soon as either member leaves.

use serde::{Deserialize, Serialize};

use crate::error::{WmError, WmResult};
use crate::geometry::{Point, Rect};
use crate::layout;
use crate::minimize::MinimizeReason;
use crate::window_node::{
    ModeSupport, WindowFlags, WindowId, WindowMode, WindowNode, WindowOption, WindowType,
};
use crate::agent::WindowUpdateType;

use super::{check_point, DragCapture, LayoutMode, SplitState, WindowNodeContainer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerAction {
    Down,
    Move,
    Up,
}

/// Pointer event in display coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub x: i32,
    pub y: i32,
}

impl PointerEvent {
    pub fn new(action: PointerAction, x: i32, y: i32) -> Self {
        Self { action, x, y }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Mode a window falls back to when it stops being half of a pair
fn non_split_mode(node: &WindowNode) -> WindowMode {
    let mask = node
        .mode_support
        .difference(ModeSupport::SPLIT_PRIMARY | ModeSupport::SPLIT_SECONDARY);
    let requested = if node.requested_mode.is_split() {
        WindowMode::Fullscreen
    } else {
        node.requested_mode
    };
    layout::resolve_mode(requested, mask)
}

impl WindowNodeContainer {
    pub fn set_window_mode(&mut self, id: WindowId, mode: WindowMode) -> WmResult<()> {
        self.reject_divider(id, "mode change")?;
        self.get_mut(id)?.requested_mode = mode;
        self.apply_mode(id);
        self.relayout(None);
        Ok(())
    }

    pub fn set_mode_support(&mut self, id: WindowId, mask: ModeSupport) -> WmResult<()> {
        if mask.is_empty() {
            return Err(WmError::InvalidParam("empty mode support mask".to_string()));
        }
        self.reject_divider(id, "mode support change")?;
        let node = self.get_mut(id)?;
        let before = layout::resolve_mode(node.requested_mode, node.mode_support);
        node.mode_support = mask;
        // Re-resolve when the request now lands elsewhere, or the current
        // mode left the mask; otherwise layout-assigned modes stay
        let after = layout::resolve_mode(node.requested_mode, mask);
        if before != after || !mask.supports(node.mode) {
            self.apply_mode(id);
            self.relayout(None);
        }
        Ok(())
    }

    pub fn set_layout_mode(&mut self, mode: LayoutMode) {
        if self.layout_mode == mode {
            return;
        }
        tracing::info!(display_id = self.display_id, ?mode, "layout mode changed");

        match mode {
            LayoutMode::Tile => {
                self.dissolve_split(None, None);
                self.layout_mode = LayoutMode::Tile;
                for id in self.visible_main_windows() {
                    let floating = self
                        .nodes
                        .get(&id)
                        .is_some_and(|node| node.mode_support.supports(WindowMode::Floating));
                    if floating {
                        self.set_mode(id, WindowMode::Floating);
                    }
                }
                self.queue_tile_overflow();
            }
            LayoutMode::Cascade => {
                self.layout_mode = LayoutMode::Cascade;
                for id in self.visible_main_windows() {
                    self.apply_mode(id);
                }
            }
        }
        self.relayout(None);
    }

    /// Decide the effective mode of `id`
    pub(super) fn apply_mode(&mut self, id: WindowId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let resolved = layout::resolve_mode(node.requested_mode, node.mode_support);
        let can_float = node.mode_support.supports(WindowMode::Floating);

        if !node.visible || !node.is_main_app() {
            self.set_mode(id, resolved);
            return;
        }

        if resolved.is_split() {
            self.enter_split(id, resolved);
            return;
        }

        if self.split.is_some_and(|split| split.slot_of(id).is_some()) {
            self.dissolve_split(None, Some(id));
        }

        if self.layout_mode == LayoutMode::Tile && can_float {
            self.set_mode(id, WindowMode::Floating);
            self.queue_tile_overflow();
            return;
        }

        if resolved == WindowMode::Floating {
            self.set_mode(id, WindowMode::Floating);
            self.place_floating(id);
            return;
        }

        // Fullscreen while a pair is active replaces the pair
        let quitting = if self.split.is_some() {
            self.dissolve_split(Some(MinimizeReason::SplitQuit), None)
        } else {
            Vec::new()
        };

        let others: Vec<WindowId> = self
            .visible_main_windows()
            .into_iter()
            .filter(|other| *other != id && !quitting.contains(other))
            .filter(|other| {
                self.nodes
                    .get(other)
                    .is_some_and(|node| node.mode == WindowMode::Fullscreen)
            })
            .collect();

        if !others.is_empty() && can_float {
            tracing::debug!(window_id = id.0, "fullscreen already taken, window floats");
            self.set_mode(id, WindowMode::Floating);
            self.place_floating(id);
            return;
        }
        for other in others {
            self.changes.minimize.push((other, MinimizeReason::OtherWindow));
        }
        self.set_mode(id, WindowMode::Fullscreen);
    }

    fn set_mode(&mut self, id: WindowId, mode: WindowMode) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if node.mode != mode {
                tracing::debug!(window_id = id.0, from = ?node.mode, to = ?mode, "window mode changed");
                node.mode = mode;
            }
        }
    }

    /// Give a floating window without a requested rect the next cascade slot
    pub(super) fn place_floating(&mut self, id: WindowId) {
        if !self.nodes.get(&id).is_some_and(|node| node.request_rect.is_empty()) {
            return;
        }
        let index = self
            .nodes
            .values()
            .filter(|other| {
                other.id != id && other.visible && other.is_main_app() && other.mode == WindowMode::Floating
            })
            .count();
        let rect = layout::cascade_rect(&self.limit_rect(), index, self.config.cascade_step);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.request_rect = rect;
        }
    }

    fn enter_split(&mut self, id: WindowId, mode: WindowMode) {
        let Some(counterpart) = mode.split_counterpart() else {
            return;
        };
        if self.layout_mode == LayoutMode::Tile {
            tracing::info!(display_id = self.display_id, "split requested, leaving tile layout");
            self.layout_mode = LayoutMode::Cascade;
        }

        let divider = self.ensure_divider();
        let mut split = self.split.unwrap_or(SplitState {
            divider,
            primary: None,
            secondary: None,
        });

        if split.slot(counterpart) == Some(id) {
            split.set_slot(counterpart, None);
        }
        if let Some(previous) = split.slot(mode).filter(|previous| *previous != id) {
            tracing::info!(window_id = previous.0, replaced_by = id.0, "split slot taken over");
            if let Some(node) = self.nodes.get(&previous) {
                let fallback = non_split_mode(node);
                self.set_mode(previous, fallback);
                if fallback == WindowMode::Floating {
                    self.place_floating(previous);
                }
            }
            self.changes.minimize.push((previous, MinimizeReason::SplitReplace));
        }
        split.set_slot(mode, Some(id));
        self.set_mode(id, mode);

        if split.slot(counterpart).is_none() {
            if let Some(partner) = self.pair_candidate(id, counterpart) {
                tracing::debug!(window_id = id.0, partner = partner.0, "split auto-paired");
                self.set_mode(partner, counterpart);
                split.set_slot(counterpart, Some(partner));
            }
        }

        self.split = Some(split);
        self.raise(split.divider);
    }

    /// Topmost visible main window able to take the `mode` half
    fn pair_candidate(&self, id: WindowId, mode: WindowMode) -> Option<WindowId> {
        self.topmost(|node| {
            node.id != id
                && node.is_main_app()
                && matches!(node.mode, WindowMode::Fullscreen | WindowMode::Floating)
                && node.mode_support.supports(mode)
        })
    }

    fn ensure_divider(&mut self) -> WindowId {
        if let Some(split) = self.split {
            return split.divider;
        }

        let id = self.ids.allocate();
        let option = WindowOption {
            window_type: WindowType::DockSlice,
            mode: WindowMode::Floating,
            mode_support: ModeSupport::FLOATING,
            flags: WindowFlags::empty(),
            focusable: false,
            display_id: self.display_id,
            ..WindowOption::default()
        };
        let rect = layout::divider_rect(&self.limit_rect(), self.config.split_ratio, self.config.divider_width);
        let mut node = WindowNode::new(id, "divider", &option, None);
        node.request_rect = rect;
        node.rect = rect;
        node.visible = true;
        node.z_index = self.top_z(node.z_bucket) + 1;
        self.nodes.insert(id, node);

        self.split = Some(SplitState {
            divider: id,
            primary: None,
            secondary: None,
        });
        self.changes.created.push(id);
        self.emit_status(id, WindowUpdateType::Added);
        tracing::info!(display_id = self.display_id, window_id = id.0, ?rect, "split divider created");
        id
    }

    /// End the active pair and destroy the divider.
    ///
    /// Members revert to their non-split mode. Those other than `leaving`
    /// are returned, and queued for minimize when `reason` is set.
    pub(super) fn dissolve_split(&mut self, reason: Option<MinimizeReason>, leaving: Option<WindowId>) -> Vec<WindowId> {
        let Some(split) = self.split.take() else {
            return Vec::new();
        };
        self.drag = None;

        let mut remaining = Vec::new();
        for member in split.members() {
            let Some(node) = self.nodes.get(&member) else {
                continue;
            };
            let fallback = non_split_mode(node);
            self.set_mode(member, fallback);
            if fallback == WindowMode::Floating {
                self.place_floating(member);
            }
            if Some(member) == leaving {
                continue;
            }
            if let Some(reason) = reason {
                self.changes.minimize.push((member, reason));
            }
            remaining.push(member);
        }

        if self.nodes.contains_key(&split.divider) {
            self.emit_divider_removed(split.divider);
            self.nodes.remove(&split.divider);
            self.changes.destroyed.push(split.divider);
        }
        tracing::info!(display_id = self.display_id, ?reason, "split pair dissolved");
        remaining
    }

    fn emit_divider_removed(&mut self, divider: WindowId) {
        if let Some(node) = self.nodes.get_mut(&divider) {
            node.visible = false;
        }
        self.emit_status(divider, WindowUpdateType::Removed);
    }

    /// Tile-managed windows, bottom to top
    pub(super) fn tile_candidates(&self) -> Vec<WindowId> {
        self.visible_main_windows()
            .into_iter()
            .filter(|id| {
                self.nodes.get(id).is_some_and(|node| {
                    node.mode == WindowMode::Floating && node.mode_support.supports(WindowMode::Floating)
                })
            })
            .collect()
    }

    /// Queue the lowest tile-managed windows beyond the tile limit
    fn queue_tile_overflow(&mut self) {
        let candidates = self.tile_candidates();
        let overflow = candidates.len().saturating_sub(self.config.max_tile_windows);
        for id in &candidates[..overflow] {
            self.changes.minimize.push((*id, MinimizeReason::LayoutTile));
        }
    }

    fn split_move_forbidden(&self) -> bool {
        self.split.is_some_and(|split| {
            split.members().any(|member| {
                self.nodes
                    .get(&member)
                    .is_some_and(|node| node.has_flag(WindowFlags::FORBID_SPLIT_MOVE))
            })
        })
    }

    /// Move the divider towards `(x, y)`, along the split axis only
    pub(super) fn move_divider_to(&mut self, x: i32, y: i32) -> WmResult<()> {
        let Some(split) = self.split else {
            return Err(WmError::InvalidParam("no active split".to_string()));
        };
        if self.split_move_forbidden() {
            return Err(WmError::NotPermitted("split window forbids divider moves".to_string()));
        }
        let rect = self.get(split.divider)?.rect;
        let delta = if self.limit_rect().is_landscape() { x - rect.x } else { y - rect.y };
        self.drag_divider_from(rect, delta);
        Ok(())
    }

    fn drag_divider_from(&mut self, from: Rect, delta: i32) {
        let Some(split) = self.split else {
            return;
        };
        let rect = layout::drag_divider(&self.limit_rect(), &from, delta, self.config.split_min_size);
        if let Some(node) = self.nodes.get_mut(&split.divider) {
            node.request_rect = rect;
        }
        self.set_rect(split.divider, rect, None);
        self.relayout(None);
    }

    /// Feed a pointer event to `id`. Only the divider reacts.
    pub fn consume_pointer_event(&mut self, id: WindowId, event: PointerEvent) -> WmResult<()> {
        check_point(event.position())?;
        let rect = self.get(id)?.rect;
        if !self.is_divider(id) {
            tracing::trace!(window_id = id.0, "pointer event ignored");
            return Ok(());
        }

        match event.action {
            PointerAction::Down => {
                if self.drag.is_some() {
                    tracing::debug!(window_id = id.0, "divider already captured, press ignored");
                    return Ok(());
                }
                self.drag = Some(DragCapture {
                    start: event.position(),
                    start_rect: rect,
                });
            }
            PointerAction::Move => {
                let Some(capture) = self.drag else {
                    return Ok(());
                };
                if self.split_move_forbidden() {
                    tracing::debug!(window_id = id.0, "divider move forbidden");
                    return Ok(());
                }
                let delta = if self.limit_rect().is_landscape() {
                    event.x - capture.start.x
                } else {
                    event.y - capture.start.y
                };
                self.drag_divider_from(capture.start_rect, delta);
            }
            PointerAction::Up => {
                self.drag = None;
            }
        }
        Ok(())
    }
}
