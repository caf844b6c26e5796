//! Per-display window container
//!
//! One `WindowNodeContainer` exists per display. It owns every node on that
//! display and is the only place those nodes are mutated; the root wraps it
//! in a mutex, which makes that mutex the display's mutation authority.
//!
//! # Responsibilities
//!
//! - Node forest (parent/child links) and z-order within layering buckets
//! - Visibility, mode resolution, split pairing and the divider node
//! - Effective rects (cascade, tile, split, avoid-area carve-out)
//! - Focus tracking
//! - Publishing events to the outbound channel and collecting minimize
//!   candidates for the root to flush
//!
//! # NOT Responsible For
//!
//! - Rect arithmetic (see `layout.rs` - pure functions)
//! - Id and client indexes across displays (see `root.rs`)
//! - Talking to observers or the ability service directly

mod core;
mod focus;
mod split;

use std::collections::{BTreeMap, HashSet};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentEvent, SystemBarRegionTint, WindowUpdateType};
use crate::avoid_area::{AvoidArea, AvoidAreaController, AvoidEdge};
use crate::config::LayoutConfig;
use crate::display::{DisplayId, DisplayInfo};
use crate::error::{WmError, WmResult};
use crate::geometry::{Point, Rect};
use crate::layout;
use crate::minimize::MinimizeReason;
use crate::window_node::{IdAllocator, WindowFlags, WindowId, WindowMode, WindowNode, ZBucket};

pub(crate) use self::core::{check_point, check_rect};
pub use split::{PointerAction, PointerEvent};

/// Base arrangement of main windows on a display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    #[default]
    Cascade,
    Tile,
}

/// Side effects of a mutation that the root settles once the container
/// lock is released
#[derive(Debug, Default)]
pub struct ContainerChanges {
    /// Server-owned nodes created by the container (the divider)
    pub created: Vec<WindowId>,
    pub destroyed: Vec<WindowId>,
    pub minimize: Vec<(WindowId, MinimizeReason)>,
}

impl ContainerChanges {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.destroyed.is_empty() && self.minimize.is_empty()
    }
}

/// Active split pair. Slots may be empty while waiting for a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SplitState {
    divider: WindowId,
    primary: Option<WindowId>,
    secondary: Option<WindowId>,
}

impl SplitState {
    fn slot(&self, mode: WindowMode) -> Option<WindowId> {
        match mode {
            WindowMode::SplitPrimary => self.primary,
            WindowMode::SplitSecondary => self.secondary,
            _ => None,
        }
    }

    fn set_slot(&mut self, mode: WindowMode, id: Option<WindowId>) {
        match mode {
            WindowMode::SplitPrimary => self.primary = id,
            WindowMode::SplitSecondary => self.secondary = id,
            _ => {}
        }
    }

    fn slot_of(&self, id: WindowId) -> Option<WindowMode> {
        if self.primary == Some(id) {
            Some(WindowMode::SplitPrimary)
        } else if self.secondary == Some(id) {
            Some(WindowMode::SplitSecondary)
        } else {
            None
        }
    }

    fn members(&self) -> impl Iterator<Item = WindowId> {
        self.primary.into_iter().chain(self.secondary)
    }
}

/// Divider drag in progress
#[derive(Debug, Clone, Copy)]
struct DragCapture {
    start: Point,
    start_rect: Rect,
}

pub(crate) fn unknown_window(id: WindowId) -> WmError {
    WmError::InvalidParam(format!("unknown window {}", id.0))
}

pub struct WindowNodeContainer {
    display_id: DisplayId,
    display_rect: Rect,
    nodes: BTreeMap<WindowId, WindowNode>,
    avoid: AvoidAreaController,
    focused: Option<WindowId>,
    layout_mode: LayoutMode,
    split: Option<SplitState>,
    drag: Option<DragCapture>,
    ids: Arc<IdAllocator>,
    config: LayoutConfig,
    events: Sender<AgentEvent>,
    changes: ContainerChanges,
    last_tints: Vec<SystemBarRegionTint>,
}

impl WindowNodeContainer {
    pub fn new(info: DisplayInfo, config: LayoutConfig, ids: Arc<IdAllocator>, events: Sender<AgentEvent>) -> Self {
        tracing::info!(display_id = info.id, rect = ?info.rect, "window container created");
        Self {
            display_id: info.id,
            display_rect: info.rect,
            nodes: BTreeMap::new(),
            avoid: AvoidAreaController::new(info.id, info.rect, Box::new(events.clone())),
            focused: None,
            layout_mode: LayoutMode::Cascade,
            split: None,
            drag: None,
            ids,
            config,
            events,
            changes: ContainerChanges::default(),
            last_tints: Vec::new(),
        }
    }

    pub fn display_id(&self) -> DisplayId {
        self.display_id
    }

    pub fn display_rect(&self) -> Rect {
        self.display_rect
    }

    pub fn node(&self, id: WindowId) -> Option<&WindowNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn focused(&self) -> Option<WindowId> {
        self.focused
    }

    pub fn layout_mode(&self) -> LayoutMode {
        self.layout_mode
    }

    pub fn divider_id(&self) -> Option<WindowId> {
        self.split.map(|split| split.divider)
    }

    /// Current (primary, secondary) occupants
    pub fn split_pair(&self) -> Option<(Option<WindowId>, Option<WindowId>)> {
        self.split.map(|split| (split.primary, split.secondary))
    }

    pub fn is_divider(&self, id: WindowId) -> bool {
        self.divider_id() == Some(id)
    }

    pub fn get_avoid_area(&self) -> Vec<AvoidArea> {
        self.avoid.avoid_area()
    }

    pub fn get_avoid_area_by_type(&self, edge: AvoidEdge) -> Option<Rect> {
        self.avoid.avoid_area_by_type(edge)
    }

    /// Display area not covered by avoid areas
    pub fn limit_rect(&self) -> Rect {
        layout::limit_rect(&self.display_rect, &self.avoid.avoid_area())
    }

    /// Node ids bottom to top
    pub fn z_order(&self) -> Vec<WindowId> {
        let mut order: Vec<&WindowNode> = self.nodes.values().collect();
        order.sort_by_key(|node| (node.z_bucket, node.z_index));
        order.into_iter().map(|node| node.id).collect()
    }

    /// Drain the side effects collected since the last call
    pub fn take_changes(&mut self) -> ContainerChanges {
        std::mem::take(&mut self.changes)
    }

    fn get(&self, id: WindowId) -> WmResult<&WindowNode> {
        self.nodes.get(&id).ok_or_else(|| unknown_window(id))
    }

    fn get_mut(&mut self, id: WindowId) -> WmResult<&mut WindowNode> {
        self.nodes.get_mut(&id).ok_or_else(|| unknown_window(id))
    }

    fn reject_divider(&self, id: WindowId, what: &str) -> WmResult<()> {
        if self.is_divider(id) {
            return Err(WmError::NotPermitted(format!("{} on the split divider", what)));
        }
        Ok(())
    }

    fn top_z(&self, bucket: ZBucket) -> u32 {
        self.nodes
            .values()
            .filter(|node| node.z_bucket == bucket)
            .map(|node| node.z_index)
            .max()
            .unwrap_or(0)
    }

    /// Move a node, then its descendants, to the top of their buckets
    fn raise(&mut self, id: WindowId) {
        let Some(bucket) = self.nodes.get(&id).map(|node| node.z_bucket) else {
            return;
        };
        let top = self.top_z(bucket);
        let children = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.z_index = top + 1;
                node.children.clone()
            }
            None => return,
        };
        for child in children {
            self.raise(child);
        }
    }

    /// Topmost visible node matching `pred`
    fn topmost(&self, pred: impl Fn(&WindowNode) -> bool) -> Option<WindowId> {
        self.z_order()
            .into_iter()
            .rev()
            .filter_map(|id| self.nodes.get(&id))
            .find(|node| node.visible && pred(node))
            .map(|node| node.id)
    }

    /// Visible main windows, bottom to top
    fn visible_main_windows(&self) -> Vec<WindowId> {
        self.z_order()
            .into_iter()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .is_some_and(|node| node.visible && node.is_main_app())
            })
            .collect()
    }

    fn emit(&self, event: AgentEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!(display_id = self.display_id, "event dropped, receiver gone");
        }
    }

    fn emit_status(&self, id: WindowId, update_type: WindowUpdateType) {
        if let Some(node) = self.nodes.get(&id) {
            self.emit(AgentEvent::WindowStatusChanged {
                info: node.info(),
                update_type,
            });
        }
    }

    /// Recompute every effective rect.
    ///
    /// Visible nodes whose rect changed report a Bounds update, except
    /// `quiet` (a node about to report itself as Added).
    fn relayout(&mut self, quiet: Option<WindowId>) {
        let limit = self.limit_rect();
        let mut halves = None;

        if let Some(split) = self.split {
            let width = self.config.divider_width;
            let min_size = self.config.split_min_size;
            let ratio = self.config.split_ratio;
            if let Some(divider) = self.nodes.get(&split.divider) {
                let thickness = if limit.is_landscape() { divider.rect.width } else { divider.rect.height };
                let rect = if thickness == width {
                    layout::drag_divider(&limit, &divider.rect, 0, min_size)
                } else {
                    layout::divider_rect(&limit, ratio, width)
                };
                self.set_rect(split.divider, rect, quiet);
                halves = Some(layout::split_rects(&limit, &rect));
            }
        }

        let mut tiles = BTreeMap::new();
        if self.layout_mode == LayoutMode::Tile {
            let candidates = self.tile_candidates();
            let start = candidates.len().saturating_sub(self.config.max_tile_windows);
            let tiled = &candidates[start..];
            for (id, rect) in tiled.iter().zip(layout::tile_rects(&limit, tiled.len())) {
                tiles.insert(*id, rect);
            }
        }

        // Ids grow with creation time, so parents come before their children
        let ids: Vec<WindowId> = self.nodes.keys().copied().collect();
        for id in ids {
            if self.is_divider(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let mut target = if node.is_main_app() {
                match node.mode {
                    WindowMode::Fullscreen if node.has_flag(WindowFlags::NEED_AVOID) => limit,
                    WindowMode::Fullscreen => self.display_rect,
                    WindowMode::SplitPrimary | WindowMode::SplitSecondary => {
                        let slot = self.split.and_then(|split| split.slot_of(id));
                        match (slot, halves) {
                            (Some(WindowMode::SplitPrimary), Some((primary, _))) => primary,
                            (Some(WindowMode::SplitSecondary), Some((_, secondary))) => secondary,
                            _ => limit,
                        }
                    }
                    WindowMode::Floating => tiles.get(&id).copied().unwrap_or(node.request_rect),
                }
            } else {
                node.request_rect
            };
            if let Some(parent) = node.parent_id.and_then(|parent| self.nodes.get(&parent)) {
                if parent.has_flag(WindowFlags::PARENT_LIMIT) {
                    target = target.clamp_into(&parent.rect);
                }
            }
            self.set_rect(id, target, quiet);
        }

        self.refresh_tints();
    }

    fn set_rect(&mut self, id: WindowId, rect: Rect, quiet: Option<WindowId>) {
        let report = match self.nodes.get_mut(&id) {
            Some(node) if node.rect != rect => {
                node.rect = rect;
                node.visible && Some(id) != quiet
            }
            _ => false,
        };
        if report {
            self.emit_status(id, WindowUpdateType::Bounds);
        }
    }

    /// Derive bar tints from the topmost visible main window
    fn refresh_tints(&mut self) {
        let order = self.z_order();
        let top_main = self.topmost(WindowNode::is_main_app).and_then(|id| self.nodes.get(&id));
        let tints: Vec<SystemBarRegionTint> = order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|bar| bar.visible && bar.window_type.is_system_bar())
            .map(|bar| SystemBarRegionTint {
                bar_type: bar.window_type,
                prop: top_main
                    .and_then(|main| main.system_bar_props.get(&bar.window_type).copied())
                    .unwrap_or_default(),
                region: bar.rect,
            })
            .collect();

        if tints != self.last_tints {
            tracing::debug!(display_id = self.display_id, tints = tints.len(), "system bar tints changed");
            self.last_tints = tints.clone();
            self.emit(AgentEvent::SystemBarTintsChanged {
                display_id: self.display_id,
                tints,
            });
        }
    }

    /// Check structural invariants (for testing)
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut z_slots = HashSet::new();
        let mut focused_count = 0;

        for (id, node) in &self.nodes {
            if node.id != *id {
                return Err(format!("node {} stored under id {}", node.id.0, id.0));
            }
            if node.display_id != self.display_id {
                return Err(format!("node {} has display {} in container {}", id.0, node.display_id, self.display_id));
            }
            if !z_slots.insert((node.z_bucket, node.z_index)) {
                return Err(format!("duplicate z slot {:?}/{} at node {}", node.z_bucket, node.z_index, id.0));
            }
            if let Some(parent_id) = node.parent_id {
                let parent = self
                    .nodes
                    .get(&parent_id)
                    .ok_or_else(|| format!("node {} has missing parent {}", id.0, parent_id.0))?;
                if !parent.children.contains(id) {
                    return Err(format!("parent {} does not list child {}", parent_id.0, id.0));
                }
            }
            for child in &node.children {
                let child_node = self
                    .nodes
                    .get(child)
                    .ok_or_else(|| format!("node {} lists missing child {}", id.0, child.0))?;
                if child_node.parent_id != Some(*id) {
                    return Err(format!("child {} does not point back to {}", child.0, id.0));
                }
            }
            if node.focused {
                focused_count += 1;
                if self.focused != Some(*id) {
                    return Err(format!("node {} flagged focused but container focus is {:?}", id.0, self.focused));
                }
                if !node.visible || !node.focusable {
                    return Err(format!("focused node {} is hidden or not focusable", id.0));
                }
            }
        }

        if focused_count > 1 {
            return Err(format!("{} nodes flagged focused", focused_count));
        }
        if let Some(focused) = self.focused {
            if !self.nodes.get(&focused).is_some_and(|node| node.focused) {
                return Err(format!("container focus {} is not flagged on a node", focused.0));
            }
        }

        if let Some(split) = self.split {
            if !self.nodes.contains_key(&split.divider) {
                return Err(format!("split divider {} missing", split.divider.0));
            }
            for (mode, slot) in [
                (WindowMode::SplitPrimary, split.primary),
                (WindowMode::SplitSecondary, split.secondary),
            ] {
                if let Some(member) = slot {
                    let node = self
                        .nodes
                        .get(&member)
                        .ok_or_else(|| format!("split member {} missing", member.0))?;
                    if node.mode != mode || !node.visible {
                        return Err(format!("split member {} is {:?}, visible={}", member.0, node.mode, node.visible));
                    }
                }
            }
            if let (Some(primary), Some(secondary), Some(divider)) = (
                split.primary.and_then(|id| self.nodes.get(&id)),
                split.secondary.and_then(|id| self.nodes.get(&id)),
                self.nodes.get(&split.divider),
            ) {
                layout::check_split(&self.limit_rect(), &divider.rect, &primary.rect, &secondary.rect)?;
            }
        } else if let Some(node) = self.nodes.values().find(|node| node.visible && node.is_main_app() && node.mode.is_split()) {
            return Err(format!("node {} in {:?} without a split pair", node.id.0, node.mode));
        }

        Ok(())
    }
}
