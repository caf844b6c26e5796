//! Window mode and mode-support tests

use test_harness::assertions::assert_invariants;
use test_harness::fixtures::{empty_root, fullscreen_only, split_screen};
use wmserver::geometry::Rect;
use wmserver::window_node::{ModeSupport, WindowMode, WindowOption};
use wmserver::WmError;

#[test]
fn unsupported_request_falls_back_by_priority() {
    let mut root = empty_root();
    let app = root.spawn_app_with(WindowOption {
        mode: WindowMode::SplitPrimary,
        mode_support: ModeSupport::FLOATING | ModeSupport::SPLIT_SECONDARY,
        ..WindowOption::default()
    });
    assert_eq!(root.info(app.window).mode, WindowMode::Floating);
    assert!(root.root().divider(0).is_none());
}

#[test]
fn split_request_without_split_support_shows_fullscreen() {
    let mut root = empty_root();
    let id = root
        .create(
            "w",
            WindowOption {
                mode_support: ModeSupport::FULLSCREEN | ModeSupport::FLOATING,
                ..WindowOption::default()
            },
        )
        .unwrap();

    root.root().set_window_mode(id, WindowMode::SplitPrimary).unwrap();
    root.root().show_window(id).unwrap();

    assert_eq!(root.info(id).mode, WindowMode::Fullscreen);
    assert!(root.root().divider(0).is_none());
}

#[test]
fn empty_support_mask_is_invalid() {
    let mut root = empty_root();
    let app = root.spawn_app();
    let result = root.root().set_mode_support_info(app.window, ModeSupport::empty());
    assert!(matches!(result, Err(WmError::InvalidParam(_))));
    assert_eq!(root.root().window(app.window).unwrap().mode_support, ModeSupport::ALL);
}

#[test]
fn narrowing_support_re_resolves_mode() {
    let mut root = empty_root();
    let first = root.spawn_app();
    let second = root.spawn_app();
    assert_eq!(root.info(second.window).mode, WindowMode::Floating);

    root.root().set_mode_support_info(second.window, ModeSupport::FULLSCREEN).unwrap();

    assert_eq!(root.info(second.window).mode, WindowMode::Fullscreen);
    assert_eq!(root.ability().calls(), vec![(first.token, false)]);
    assert_invariants(&root);
}

#[test]
fn widening_support_keeps_current_mode() {
    let mut root = empty_root();
    let app = root.spawn_app_with(fullscreen_only());
    root.root().set_mode_support_info(app.window, ModeSupport::ALL).unwrap();
    assert_eq!(root.info(app.window).mode, WindowMode::Fullscreen);
}

#[test]
fn widening_support_to_the_requested_mode_adopts_it() {
    let mut root = empty_root();
    let app = root.spawn_app_with(WindowOption {
        mode: WindowMode::SplitPrimary,
        mode_support: ModeSupport::FULLSCREEN | ModeSupport::FLOATING,
        ..WindowOption::default()
    });
    assert_eq!(root.info(app.window).mode, WindowMode::Fullscreen);

    root.root().set_mode_support_info(app.window, ModeSupport::ALL).unwrap();

    assert_eq!(root.info(app.window).mode, WindowMode::SplitPrimary);
    assert!(root.root().divider(0).is_some());
    assert_eq!(root.rect(app.window), Rect::new(0, 0, 632, 720));
    assert_invariants(&root);
}

#[test]
fn support_change_keeps_auto_paired_partner() {
    let (root, _, secondary, divider) = split_screen();

    root.root()
        .set_mode_support_info(secondary.window, ModeSupport::FULLSCREEN | ModeSupport::SPLIT_SECONDARY)
        .unwrap();

    assert_eq!(root.info(secondary.window).mode, WindowMode::SplitSecondary);
    assert_eq!(root.root().divider(0), Some(divider));
    assert_invariants(&root);
}

#[test]
fn mode_request_on_hidden_window_applies_on_show() {
    let mut root = empty_root();
    root.spawn_app();
    let id = root.create("later", WindowOption::default()).unwrap();

    root.root().set_window_mode(id, WindowMode::Floating).unwrap();
    assert_eq!(root.info(id).mode, WindowMode::Floating);

    root.root().show_window(id).unwrap();
    assert_eq!(root.info(id).mode, WindowMode::Floating);
    assert_eq!(root.rect(id), Rect::new(0, 0, 853, 480));
}

#[test]
fn floating_to_fullscreen_demotes_when_taken() {
    let mut root = empty_root();
    root.spawn_app();
    let second = root.spawn_app();

    root.root().set_window_mode(second.window, WindowMode::Fullscreen).unwrap();

    assert_eq!(root.info(second.window).mode, WindowMode::Floating);
    assert!(root.ability().calls().is_empty());
}

#[test]
fn cascade_slots_step_diagonally() {
    let mut root = empty_root();
    root.spawn_app();
    let floats: Vec<_> = (0..3).map(|_| root.spawn_app()).collect();

    assert_eq!(root.rect(floats[0].window), Rect::new(0, 0, 853, 480));
    assert_eq!(root.rect(floats[1].window), Rect::new(48, 48, 853, 480));
    assert_eq!(root.rect(floats[2].window), Rect::new(96, 96, 853, 480));
}
