//! Test assertions for window manager state

use wmserver::agent::WindowUpdateType;
use wmserver::avoid_area::AvoidArea;
use wmserver::display::DisplayId;
use wmserver::geometry::Rect;
use wmserver::window_node::WindowId;
use wmserver::AgentEvent;

use crate::headless::TestRoot;

/// Assert that root and container invariants hold
pub fn assert_invariants(root: &TestRoot) {
    if let Err(e) = root.check() {
        panic!("{}", e);
    }
}

/// Assert that two rects share no pixel
pub fn assert_disjoint(a: &Rect, b: &Rect) {
    let overlap_x = a.x < b.right() && b.x < a.right();
    let overlap_y = a.y < b.bottom() && b.y < a.bottom();
    assert!(!(overlap_x && overlap_y), "rects overlap: {:?} and {:?}", a, b);
}

/// Assert that `inner` lies entirely inside `outer`
pub fn assert_within(inner: &Rect, outer: &Rect) {
    assert!(
        inner.x >= outer.x && inner.y >= outer.y && inner.right() <= outer.right() && inner.bottom() <= outer.bottom(),
        "{:?} is not inside {:?}",
        inner,
        outer
    );
}

/// (window, focused) pairs of the focus events, in delivery order
pub fn focus_log(events: &[AgentEvent]) -> Vec<(WindowId, bool)> {
    events
        .iter()
        .filter_map(|event| match event {
            AgentEvent::FocusChanged { window_id, focused, .. } => Some((*window_id, *focused)),
            _ => None,
        })
        .collect()
}

/// (window, update) pairs of the status events, in delivery order
pub fn status_log(events: &[AgentEvent]) -> Vec<(WindowId, WindowUpdateType)> {
    events
        .iter()
        .filter_map(|event| match event {
            AgentEvent::WindowStatusChanged { info, update_type } => Some((info.window_id, *update_type)),
            _ => None,
        })
        .collect()
}

/// Avoid-area vectors broadcast for `display_id`, in delivery order
pub fn avoid_log(events: &[AgentEvent], display_id: DisplayId) -> Vec<Vec<AvoidArea>> {
    events
        .iter()
        .filter_map(|event| match event {
            AgentEvent::AvoidAreaChanged { display_id: d, areas } if *d == display_id => Some(areas.clone()),
            _ => None,
        })
        .collect()
}

/// Assert that exactly one window holds focus on a display, and that it is `expected`
pub fn assert_focused(root: &TestRoot, display_id: DisplayId, expected: Option<WindowId>) {
    let focused = root.root().focused_window(display_id);
    assert_eq!(focused, expected, "display {} focus mismatch", display_id);
    let flagged: Vec<WindowId> = root
        .snapshot(display_id)
        .windows
        .iter()
        .filter(|w| w.focused)
        .map(|w| w.window_id)
        .collect();
    assert_eq!(flagged, expected.into_iter().collect::<Vec<_>>(), "focused flags disagree with container focus");
}

/// Replay the focus events of one display in delivery order.
///
/// Every gain must follow the previous holder's loss. Returns the window the
/// log leaves focused.
pub fn replay_focus(events: &[AgentEvent], display_id: DisplayId) -> Result<Option<WindowId>, String> {
    let mut focused = None;
    for (i, event) in events.iter().enumerate() {
        let AgentEvent::FocusChanged { window_id, display_id: d, focused: gained, .. } = event else {
            continue;
        };
        if *d != display_id {
            continue;
        }
        match (*gained, focused) {
            (true, None) => focused = Some(*window_id),
            (false, Some(holder)) if holder == *window_id => focused = None,
            (gained, holder) => {
                return Err(format!(
                    "event {}: window {} focused={} while log holds {:?}",
                    i,
                    window_id.0,
                    gained,
                    holder.map(|h| h.0)
                ));
            }
        }
    }
    Ok(focused)
}

/// Assert that the delivered focus log of a display ends at the committed focus
pub fn assert_focus_log_matches(root: &TestRoot, events: &[AgentEvent], display_id: DisplayId) {
    let replayed = replay_focus(events, display_id).unwrap_or_else(|e| panic!("display {}: {}", display_id, e));
    assert_eq!(
        replayed,
        root.root().focused_window(display_id),
        "display {} focus log disagrees with committed focus",
        display_id
    );
}
