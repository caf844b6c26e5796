//! Test fixtures for common test scenarios

use wmserver::geometry::Rect;
use wmserver::window_node::{ModeSupport, WindowId, WindowMode, WindowOption, WindowType};

use crate::headless::{AppHandle, TestRoot};

/// Standard test display dimensions
pub const TEST_WIDTH: u32 = 1280;
pub const TEST_HEIGHT: u32 = 720;

/// Status bar height used by the bar fixtures
pub const STATUS_BAR_HEIGHT: u32 = 40;

/// Navigation bar height used by the bar fixtures
pub const NAV_BAR_HEIGHT: u32 = 48;

/// Root with one empty 1280x720 display
pub fn empty_root() -> TestRoot {
    TestRoot::new_headless(TEST_WIDTH, TEST_HEIGHT)
}

/// Root with a status bar on top and a navigation bar at the bottom
///
/// Returns: (root, status_bar, navigation_bar)
pub fn root_with_bars() -> (TestRoot, WindowId, WindowId) {
    let mut root = empty_root();
    let status = root.status_bar(STATUS_BAR_HEIGHT);
    let nav = root.navigation_bar(NAV_BAR_HEIGHT);
    (root, status, nav)
}

/// App that can only run fullscreen
pub fn fullscreen_only() -> WindowOption {
    WindowOption {
        mode_support: ModeSupport::FULLSCREEN,
        ..WindowOption::default()
    }
}

/// Floating app at a fixed rect
pub fn floating_at(rect: Rect) -> WindowOption {
    WindowOption {
        mode: WindowMode::Floating,
        rect,
        ..WindowOption::default()
    }
}

/// Sub window of `parent`
pub fn sub_window(parent: WindowId, rect: Rect) -> WindowOption {
    WindowOption {
        window_type: WindowType::AppSub,
        parent_id: Some(parent),
        rect,
        ..WindowOption::default()
    }
}

/// Two apps in an active split pair
///
/// The first app is fullscreen, the second is created floating and then
/// switched to the primary half, which pulls the first into the secondary
/// half.
///
/// Returns: (root, primary, secondary, divider)
pub fn split_screen() -> (TestRoot, AppHandle, AppHandle, WindowId) {
    let mut root = empty_root();
    let secondary = root.spawn_app();
    let primary = root.spawn_app();
    root.root()
        .set_window_mode(primary.window, WindowMode::SplitPrimary)
        .unwrap_or_else(|e| panic!("split request failed: {}", e));
    let divider = root
        .root()
        .divider(0)
        .unwrap_or_else(|| panic!("split did not create a divider"));
    (root, primary, secondary, divider)
}
