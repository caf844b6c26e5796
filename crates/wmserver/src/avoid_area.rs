//! System-reserved screen regions
//!
//! Status bars, navigation bars, the input method and the split divider can
//! reserve an edge of the display. The controller classifies each
//! contributor into one edge and keeps at most one entry per edge; after
//! every control call it publishes the whole vector exactly once.

use std::collections::BTreeMap;
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};

use crate::agent::AgentEvent;
use crate::display::DisplayId;
use crate::geometry::Rect;
use crate::window_node::{WindowFlags, WindowId, WindowNode};

/// Display edge an avoid area is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidEdge {
    Top,
    Bottom,
    Left,
    Right,
}

impl AvoidEdge {
    pub const ALL: [AvoidEdge; 4] = [AvoidEdge::Top, AvoidEdge::Bottom, AvoidEdge::Left, AvoidEdge::Right];
}

/// Kind of avoid-area update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidControlOp {
    Add,
    Update,
    Remove,
}

/// One reserved region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvoidArea {
    pub edge: AvoidEdge,
    pub rect: Rect,
}

/// Receiver of recomputed avoid areas
pub trait AvoidAreaNotifier: Send {
    fn avoid_area_changed(&self, display_id: DisplayId, areas: &[AvoidArea]);
}

impl AvoidAreaNotifier for Sender<AgentEvent> {
    fn avoid_area_changed(&self, display_id: DisplayId, areas: &[AvoidArea]) {
        let event = AgentEvent::AvoidAreaChanged {
            display_id,
            areas: areas.to_vec(),
        };
        if self.send(event).is_err() {
            tracing::warn!(display_id, "avoid area event dropped, receiver gone");
        }
    }
}

/// Classify a contributor rect into a display edge.
///
/// Full-width rects touching the top or bottom edge and full-height rects
/// touching the left or right edge are classified directly; anything else
/// goes to the nearest edge, ties resolved top, bottom, left, right.
pub fn classify_edge(rect: &Rect, display: &Rect) -> AvoidEdge {
    let full_width = rect.x == display.x && rect.width == display.width;
    let full_height = rect.y == display.y && rect.height == display.height;

    if full_width && rect.y == display.y {
        return AvoidEdge::Top;
    }
    if full_width && rect.bottom() == display.bottom() {
        return AvoidEdge::Bottom;
    }
    if full_height && rect.x == display.x {
        return AvoidEdge::Left;
    }
    if full_height && rect.right() == display.right() {
        return AvoidEdge::Right;
    }

    let distances = [
        (AvoidEdge::Top, rect.y - display.y),
        (AvoidEdge::Bottom, display.bottom() - rect.bottom()),
        (AvoidEdge::Left, rect.x - display.x),
        (AvoidEdge::Right, display.right() - rect.right()),
    ];
    let mut best = distances[0];
    for candidate in &distances[1..] {
        if candidate.1 < best.1 {
            best = *candidate;
        }
    }
    best.0
}

/// Per-display avoid-area bookkeeping
pub struct AvoidAreaController {
    display_id: DisplayId,
    display_rect: Rect,
    /// Classified contributors, by window
    contributors: BTreeMap<WindowId, AvoidArea>,
    /// One merged entry per edge
    areas: BTreeMap<AvoidEdge, Rect>,
    notifier: Box<dyn AvoidAreaNotifier>,
}

impl AvoidAreaController {
    pub fn new(display_id: DisplayId, display_rect: Rect, notifier: Box<dyn AvoidAreaNotifier>) -> Self {
        Self {
            display_id,
            display_rect,
            contributors: BTreeMap::new(),
            areas: BTreeMap::new(),
            notifier,
        }
    }

    /// Whether `node` may reserve an edge
    pub fn is_avoid_area_node(node: &WindowNode) -> bool {
        node.has_flag(WindowFlags::NEED_AVOID) && node.window_type.is_avoid_eligible()
    }

    /// Apply one contributor change.
    ///
    /// Returns false (and does nothing) for nodes that are not avoid
    /// contributors. Otherwise the area vector is recomputed and the
    /// notifier fires exactly once.
    pub fn avoid_control(&mut self, node: &WindowNode, op: AvoidControlOp) -> bool {
        if !Self::is_avoid_area_node(node) {
            return false;
        }

        match op {
            AvoidControlOp::Add | AvoidControlOp::Update => {
                let edge = classify_edge(&node.rect, &self.display_rect);
                self.contributors.insert(node.id, AvoidArea { edge, rect: node.rect });
            }
            AvoidControlOp::Remove => {
                self.contributors.remove(&node.id);
            }
        }

        self.recompute();
        let areas = self.avoid_area();
        tracing::debug!(
            display_id = self.display_id,
            window_id = node.id.0,
            ?op,
            areas = areas.len(),
            "avoid area updated"
        );
        self.notifier.avoid_area_changed(self.display_id, &areas);
        true
    }

    /// Drop a contributor whatever its current flags, notifying once when
    /// it was registered. Returns whether it was.
    pub fn withdraw(&mut self, id: WindowId) -> bool {
        if self.contributors.remove(&id).is_none() {
            return false;
        }
        self.recompute();
        let areas = self.avoid_area();
        tracing::debug!(display_id = self.display_id, window_id = id.0, areas = areas.len(), "avoid contributor withdrawn");
        self.notifier.avoid_area_changed(self.display_id, &areas);
        true
    }

    /// Drop a contributor without notifying (display teardown)
    pub fn forget(&mut self, id: WindowId) {
        if self.contributors.remove(&id).is_some() {
            self.recompute();
        }
    }

    /// Reclassify every contributor against new display geometry
    pub fn set_display_rect(&mut self, display_rect: Rect) {
        self.display_rect = display_rect;
        for area in self.contributors.values_mut() {
            area.edge = classify_edge(&area.rect, &display_rect);
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        let mut areas: BTreeMap<AvoidEdge, Rect> = BTreeMap::new();
        for area in self.contributors.values() {
            let merged = areas.entry(area.edge).or_default();
            *merged = merged.union(&area.rect);
        }
        self.areas = areas;
    }

    /// All non-empty entries, in edge order
    pub fn avoid_area(&self) -> Vec<AvoidArea> {
        self.areas
            .iter()
            .filter(|(_, rect)| !rect.is_empty())
            .map(|(edge, rect)| AvoidArea { edge: *edge, rect: *rect })
            .collect()
    }

    pub fn avoid_area_by_type(&self, edge: AvoidEdge) -> Option<Rect> {
        self.areas.get(&edge).copied().filter(|rect| !rect.is_empty())
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.contributors.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window_node::{WindowOption, WindowType};
    use std::sync::{Arc, Mutex};

    const DISPLAY: Rect = Rect::new(0, 0, 1280, 720);

    #[derive(Clone, Default)]
    struct CountingNotifier {
        calls: Arc<Mutex<Vec<Vec<AvoidArea>>>>,
    }

    impl AvoidAreaNotifier for CountingNotifier {
        fn avoid_area_changed(&self, _display_id: DisplayId, areas: &[AvoidArea]) {
            self.calls.lock().unwrap().push(areas.to_vec());
        }
    }

    fn controller() -> (AvoidAreaController, CountingNotifier) {
        let notifier = CountingNotifier::default();
        (AvoidAreaController::new(0, DISPLAY, Box::new(notifier.clone())), notifier)
    }

    fn bar(id: u32, window_type: WindowType, rect: Rect) -> WindowNode {
        let option = WindowOption { window_type, rect, ..WindowOption::default() };
        let mut node = WindowNode::new(WindowId(id), "bar", &option, None);
        node.rect = rect;
        node
    }

    #[test]
    fn classify_full_width_edges() {
        assert_eq!(classify_edge(&Rect::new(0, 0, 1280, 40), &DISPLAY), AvoidEdge::Top);
        assert_eq!(classify_edge(&Rect::new(0, 680, 1280, 40), &DISPLAY), AvoidEdge::Bottom);
    }

    #[test]
    fn classify_full_height_edges() {
        assert_eq!(classify_edge(&Rect::new(0, 0, 60, 720), &DISPLAY), AvoidEdge::Left);
        assert_eq!(classify_edge(&Rect::new(1220, 0, 60, 720), &DISPLAY), AvoidEdge::Right);
    }

    #[test]
    fn classify_by_nearest_edge() {
        // Floating keyboard near the bottom
        assert_eq!(classify_edge(&Rect::new(100, 500, 600, 200), &DISPLAY), AvoidEdge::Bottom);
        // Small rect hugging the right side
        assert_eq!(classify_edge(&Rect::new(1200, 300, 70, 100), &DISPLAY), AvoidEdge::Right);
    }

    #[test]
    fn nearest_edge_ties_prefer_top() {
        // Centered square: equal distance to every edge
        assert_eq!(classify_edge(&Rect::new(540, 260, 200, 200), &DISPLAY), AvoidEdge::Top);
    }

    #[test]
    fn ineligible_node_is_ignored() {
        let (mut ctrl, notifier) = controller();
        let app = bar(1, WindowType::AppMain, Rect::new(0, 0, 1280, 40));
        assert!(!ctrl.avoid_control(&app, AvoidControlOp::Add));
        assert!(notifier.calls.lock().unwrap().is_empty());

        let mut status = bar(2, WindowType::StatusBar, Rect::new(0, 0, 1280, 40));
        status.flags.remove(WindowFlags::NEED_AVOID);
        assert!(!ctrl.avoid_control(&status, AvoidControlOp::Add));
        assert!(ctrl.avoid_area().is_empty());
    }

    #[test]
    fn add_then_remove() {
        let (mut ctrl, notifier) = controller();
        let status = bar(1, WindowType::StatusBar, Rect::new(0, 0, 1280, 40));

        assert!(ctrl.avoid_control(&status, AvoidControlOp::Add));
        assert_eq!(ctrl.avoid_area_by_type(AvoidEdge::Top), Some(Rect::new(0, 0, 1280, 40)));

        assert!(ctrl.avoid_control(&status, AvoidControlOp::Remove));
        assert!(ctrl.avoid_area().is_empty());
        assert_eq!(notifier.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn identical_update_twice_notifies_once_per_call() {
        let (mut ctrl, notifier) = controller();
        let nav = bar(1, WindowType::NavigationBar, Rect::new(0, 672, 1280, 48));

        ctrl.avoid_control(&nav, AvoidControlOp::Update);
        let first = ctrl.avoid_area();
        ctrl.avoid_control(&nav, AvoidControlOp::Update);
        let second = ctrl.avoid_area();

        assert_eq!(first, second);
        let calls = notifier.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }

    #[test]
    fn update_moves_contributor_between_edges() {
        let (mut ctrl, _) = controller();
        let mut status = bar(1, WindowType::StatusBar, Rect::new(0, 0, 1280, 40));
        ctrl.avoid_control(&status, AvoidControlOp::Add);

        status.rect = Rect::new(0, 680, 1280, 40);
        ctrl.avoid_control(&status, AvoidControlOp::Update);

        assert_eq!(ctrl.avoid_area_by_type(AvoidEdge::Top), None);
        assert_eq!(ctrl.avoid_area_by_type(AvoidEdge::Bottom), Some(Rect::new(0, 680, 1280, 40)));
    }

    #[test]
    fn contributors_on_same_edge_merge() {
        let (mut ctrl, _) = controller();
        let nav = bar(1, WindowType::NavigationBar, Rect::new(0, 672, 1280, 48));
        let ime = bar(2, WindowType::InputMethod, Rect::new(0, 420, 1280, 300));
        ctrl.avoid_control(&nav, AvoidControlOp::Add);
        ctrl.avoid_control(&ime, AvoidControlOp::Add);

        let areas = ctrl.avoid_area();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0], AvoidArea { edge: AvoidEdge::Bottom, rect: Rect::new(0, 420, 1280, 300) });
    }

    #[test]
    fn vector_has_at_most_four_entries_in_edge_order() {
        let (mut ctrl, _) = controller();
        ctrl.avoid_control(&bar(1, WindowType::NavigationBar, Rect::new(0, 680, 1280, 40)), AvoidControlOp::Add);
        ctrl.avoid_control(&bar(2, WindowType::StatusBar, Rect::new(0, 0, 1280, 40)), AvoidControlOp::Add);
        ctrl.avoid_control(&bar(3, WindowType::InputMethod, Rect::new(1220, 0, 60, 720)), AvoidControlOp::Add);
        ctrl.avoid_control(&bar(4, WindowType::DockSlice, Rect::new(0, 0, 30, 720)), AvoidControlOp::Add);

        let edges: Vec<_> = ctrl.avoid_area().iter().map(|a| a.edge).collect();
        assert_eq!(edges, AvoidEdge::ALL.to_vec());
    }

    #[test]
    fn withdraw_ignores_flags_and_notifies() {
        let (mut ctrl, notifier) = controller();
        let status = bar(1, WindowType::StatusBar, Rect::new(0, 0, 1280, 40));
        ctrl.avoid_control(&status, AvoidControlOp::Add);

        assert!(ctrl.withdraw(status.id));
        assert!(!ctrl.withdraw(status.id));
        assert!(ctrl.avoid_area().is_empty());
        assert_eq!(notifier.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn forget_is_silent() {
        let (mut ctrl, notifier) = controller();
        let status = bar(1, WindowType::StatusBar, Rect::new(0, 0, 1280, 40));
        ctrl.avoid_control(&status, AvoidControlOp::Add);
        ctrl.forget(status.id);
        assert!(ctrl.avoid_area().is_empty());
        assert_eq!(notifier.calls.lock().unwrap().len(), 1);
    }
}
