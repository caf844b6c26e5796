//! Split-screen pairing and divider tests

use test_harness::assertions::{assert_disjoint, assert_invariants, status_log};
use test_harness::fixtures::{empty_root, fullscreen_only, split_screen};
use wmserver::agent::WindowUpdateType;
use wmserver::container::{LayoutMode, PointerAction, PointerEvent};
use wmserver::geometry::Rect;
use wmserver::window_node::{WindowFlags, WindowMode, WindowOption, WindowType};
use wmserver::WmError;

#[test]
fn split_request_pairs_with_fullscreen_window() {
    let (root, primary, secondary, divider) = split_screen();

    assert_eq!(root.info(primary.window).mode, WindowMode::SplitPrimary);
    assert_eq!(root.info(secondary.window).mode, WindowMode::SplitSecondary);
    assert_eq!(root.info(divider).window_type, WindowType::DockSlice);

    assert_eq!(root.rect(divider), Rect::new(632, 0, 16, 720));
    assert_eq!(root.rect(primary.window), Rect::new(0, 0, 632, 720));
    assert_eq!(root.rect(secondary.window), Rect::new(648, 0, 632, 720));
    assert_disjoint(&root.rect(primary.window), &root.rect(secondary.window));
    assert_invariants(&root);
}

#[test]
fn divider_is_indexed_and_reported() {
    let (root, _, _, divider) = split_screen();
    assert_eq!(root.root().window_count(), 3);
    let added = status_log(&root.agent().events()).contains(&(divider, WindowUpdateType::Added));
    assert!(added);
}

#[test]
fn divider_stacks_above_apps() {
    let (root, _, _, divider) = split_screen();
    assert_eq!(root.root().z_order(0).last(), Some(&divider));
    assert!(!root.info(divider).focused);
}

#[test]
fn divider_rejects_client_lifecycle_requests() {
    let (root, _, _, divider) = split_screen();
    let r = root.root();

    assert!(matches!(r.hide_window(divider), Err(WmError::NotPermitted(_))));
    assert!(matches!(r.destroy_window(divider), Err(WmError::NotPermitted(_))));
    assert!(matches!(r.resize(divider, 10, 10), Err(WmError::NotPermitted(_))));
    assert!(matches!(
        r.set_window_mode(divider, WindowMode::Fullscreen),
        Err(WmError::NotPermitted(_))
    ));
    assert!(matches!(r.set_window_flags(divider, WindowFlags::empty()), Err(WmError::NotPermitted(_))));
    assert!(matches!(r.request_focus(divider), Err(WmError::NotPermitted(_))));
    assert_invariants(&root);
}

#[test]
fn pointer_drag_moves_divider() {
    let (root, primary, secondary, divider) = split_screen();
    let r = root.root();

    r.consume_pointer_event(divider, PointerEvent::new(PointerAction::Down, 640, 360)).unwrap();
    r.consume_pointer_event(divider, PointerEvent::new(PointerAction::Move, 700, 100)).unwrap();

    assert_eq!(root.rect(divider), Rect::new(692, 0, 16, 720));
    assert_eq!(root.rect(primary.window), Rect::new(0, 0, 692, 720));
    assert_eq!(root.rect(secondary.window), Rect::new(708, 0, 572, 720));

    r.consume_pointer_event(divider, PointerEvent::new(PointerAction::Up, 700, 100)).unwrap();
    r.consume_pointer_event(divider, PointerEvent::new(PointerAction::Move, 900, 100)).unwrap();
    assert_eq!(root.rect(divider).x, 692, "moves after release are ignored");
    assert_invariants(&root);
}

#[test]
fn pointer_events_on_apps_are_ignored() {
    let (root, primary, _, divider) = split_screen();
    root.root()
        .consume_pointer_event(primary.window, PointerEvent::new(PointerAction::Down, 5, 5))
        .unwrap();
    assert_eq!(root.rect(divider).x, 632);
}

#[test]
fn divider_keeps_minimum_side_size() {
    let (root, primary, secondary, divider) = split_screen();

    root.root().move_to(divider, 10, 0).unwrap();
    assert_eq!(root.rect(divider).x, 200);
    assert_eq!(root.rect(primary.window).width, 200);

    root.root().move_to(divider, 5000, 0).unwrap();
    assert_eq!(root.rect(divider).x, 1280 - 200 - 16);
    assert_eq!(root.rect(secondary.window).width, 200);
    assert_invariants(&root);
}

#[test]
fn forbid_split_move_pins_divider() {
    let (root, primary, _, divider) = split_screen();
    root.root()
        .set_window_flags(primary.window, WindowFlags::NEED_AVOID | WindowFlags::FORBID_SPLIT_MOVE)
        .unwrap();

    assert!(matches!(root.root().move_to(divider, 700, 0), Err(WmError::NotPermitted(_))));

    let r = root.root();
    r.consume_pointer_event(divider, PointerEvent::new(PointerAction::Down, 640, 360)).unwrap();
    r.consume_pointer_event(divider, PointerEvent::new(PointerAction::Move, 800, 360)).unwrap();
    assert_eq!(root.rect(divider).x, 632);

    r.set_window_flags(primary.window, WindowFlags::NEED_AVOID).unwrap();
    r.move_to(divider, 700, 0).unwrap();
    assert_eq!(root.rect(divider).x, 700);
}

#[test]
fn destroying_a_member_dissolves_the_pair() {
    let (root, primary, secondary, divider) = split_screen();
    root.take_events();

    root.root().destroy_window(primary.window).unwrap();

    assert!(root.root().divider(0).is_none());
    assert!(root.root().window(divider).is_none());
    assert_eq!(root.info(secondary.window).mode, WindowMode::Fullscreen);
    assert_eq!(root.rect(secondary.window), Rect::new(0, 0, 1280, 720));
    assert!(status_log(&root.take_events()).contains(&(divider, WindowUpdateType::Removed)));
    assert!(root.ability().calls().is_empty(), "leaving a pair minimizes nobody");
    assert_eq!(root.root().window_count(), 1);
    assert_invariants(&root);
}

#[test]
fn hiding_a_member_dissolves_the_pair() {
    let (root, _, secondary, _) = split_screen();
    root.root().hide_window(secondary.window).unwrap();
    assert!(root.root().divider(0).is_none());
    assert_invariants(&root);
}

#[test]
fn fullscreen_app_quits_the_split() {
    let (mut root, primary, secondary, divider) = split_screen();

    let takeover = root.spawn_app_with(fullscreen_only());

    assert!(root.root().window(divider).is_none());
    assert_eq!(root.info(takeover.window).mode, WindowMode::Fullscreen);
    assert_eq!(
        root.ability().calls(),
        vec![(primary.token, false), (secondary.token, false)]
    );
    assert_invariants(&root);
}

#[test]
fn taking_an_occupied_side_replaces_its_occupant() {
    let (mut root, primary, _, _) = split_screen();
    let newcomer = root.spawn_app_with(WindowOption {
        mode: WindowMode::Floating,
        ..WindowOption::default()
    });
    assert!(root.root().divider(0).is_some(), "a floating window leaves the pair alone");

    root.root().set_window_mode(newcomer.window, WindowMode::SplitPrimary).unwrap();

    assert_eq!(root.info(newcomer.window).mode, WindowMode::SplitPrimary);
    assert_ne!(root.info(primary.window).mode, WindowMode::SplitPrimary);
    assert_eq!(root.ability().calls(), vec![(primary.token, false)]);
    assert_invariants(&root);
}

#[test]
fn split_request_leaves_tile_layout() {
    let mut root = empty_root();
    let a = root.spawn_app();
    let b = root.spawn_app();
    root.root().set_layout_mode(0, LayoutMode::Tile).unwrap();

    root.root().set_window_mode(b.window, WindowMode::SplitPrimary).unwrap();

    assert_eq!(root.root().layout_mode(0), Some(LayoutMode::Cascade));
    assert_eq!(root.info(a.window).mode, WindowMode::SplitSecondary);
    assert_invariants(&root);
}

#[test]
fn lone_split_window_waits_for_partner() {
    let mut root = empty_root();
    let only = root.spawn_app_with(WindowOption {
        mode: WindowMode::SplitSecondary,
        ..WindowOption::default()
    });

    assert_eq!(root.info(only.window).mode, WindowMode::SplitSecondary);
    assert!(root.root().divider(0).is_some());
    assert_eq!(root.rect(only.window), Rect::new(648, 0, 632, 720));

    let partner = root.spawn_app_with(WindowOption {
        mode: WindowMode::SplitPrimary,
        ..WindowOption::default()
    });
    assert_eq!(root.rect(partner.window), Rect::new(0, 0, 632, 720));
    assert_invariants(&root);
}

#[test]
fn rotation_resets_divider_across_short_axis() {
    let (root, primary, secondary, divider) = split_screen();
    root.root().move_to(divider, 900, 0).unwrap();

    root.set_display(0, Rect::new(0, 0, 720, 1280));
    root.root().notify_display_changed(0).unwrap();

    assert_eq!(root.rect(divider), Rect::new(0, 632, 720, 16));
    assert_eq!(root.rect(primary.window), Rect::new(0, 0, 720, 632));
    assert_eq!(root.rect(secondary.window), Rect::new(0, 648, 720, 632));
    assert_invariants(&root);
}
