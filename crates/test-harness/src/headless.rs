//! In-process window root wrapper for testing

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use wmserver::avoid_area::AvoidArea;
use wmserver::config::WmConfig;
use wmserver::container::LayoutMode;
use wmserver::display::{DisplayId, DisplayInfo, DisplayProvider, StaticDisplays};
use wmserver::geometry::Rect;
use wmserver::minimize::{AbilityError, AbilityManager};
use wmserver::window_node::{
    AbilityToken, ClientHandle, WindowFlags, WindowId, WindowInfo, WindowOption, WindowType,
};
use wmserver::{AgentCategory, AgentEvent, WindowManagerAgent, WindowRoot, WmError};

#[derive(Error, Debug)]
pub enum TestError {
    #[error("window manager error: {0}")]
    Wm(#[from] WmError),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Agent that keeps every event it receives
#[derive(Default)]
pub struct RecordingAgent {
    events: Mutex<Vec<AgentEvent>>,
}

impl RecordingAgent {
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().clone()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<AgentEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl WindowManagerAgent for RecordingAgent {
    fn on_event(&self, event: &AgentEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Ability service that records minimize requests
#[derive(Default)]
pub struct RecordingAbility {
    calls: Mutex<Vec<(AbilityToken, bool)>>,
    failing: Mutex<HashSet<AbilityToken>>,
}

impl RecordingAbility {
    /// (token, from_user) pairs in call order
    pub fn calls(&self) -> Vec<(AbilityToken, bool)> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Make minimize requests for `token` fail
    pub fn fail_for(&self, token: AbilityToken) {
        self.failing.lock().insert(token);
    }
}

impl AbilityManager for RecordingAbility {
    fn minimize_ability(&self, token: AbilityToken, from_user: bool) -> Result<(), AbilityError> {
        self.calls.lock().push((token, from_user));
        if self.failing.lock().contains(&token) {
            return Err(AbilityError::Unavailable("scripted failure".to_string()));
        }
        Ok(())
    }
}

/// Handles of an app window created through the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppHandle {
    pub window: WindowId,
    pub client: ClientHandle,
    pub token: AbilityToken,
}

/// Snapshot of one display for assertions
#[derive(Debug, Clone)]
pub struct RootSnapshot {
    /// Window ids, bottom to top
    pub z_order: Vec<WindowId>,

    /// Windows in the same order as `z_order`
    pub windows: Vec<WindowInfo>,

    pub focused: Option<WindowId>,

    /// Split divider, if a split is active
    pub divider: Option<WindowId>,

    pub layout_mode: Option<LayoutMode>,

    pub avoid_areas: Vec<AvoidArea>,
}

impl RootSnapshot {
    pub fn visible(&self) -> Vec<WindowId> {
        self.windows.iter().filter(|w| w.visible).map(|w| w.window_id).collect()
    }

    pub fn info(&self, id: WindowId) -> Option<&WindowInfo> {
        self.windows.iter().find(|w| w.window_id == id)
    }
}

/// Send core logs to the captured test output. `RUST_LOG` picks the level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Only the first root in a test binary installs the subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}

/// Test root wrapper
pub struct TestRoot {
    root: WindowRoot,
    displays: Arc<StaticDisplays>,
    agent: Arc<RecordingAgent>,
    ability: Arc<RecordingAbility>,
    next_client: u64,
    next_token: u64,
}

impl TestRoot {
    /// Root with a single display 0 of the given size
    pub fn new_headless(width: u32, height: u32) -> Self {
        let config = WmConfig {
            displays: Vec::new(),
            ..WmConfig::default()
        };
        let root = Self::with_config(config);
        root.displays.set(DisplayInfo {
            id: 0,
            rect: Rect::new(0, 0, width, height),
        });
        root
    }

    /// Root built from `config`, including its display table
    pub fn with_config(config: WmConfig) -> Self {
        init_logging();
        let displays = Arc::new(StaticDisplays::new(config.displays.iter().map(|d| d.info())));
        let ability = Arc::new(RecordingAbility::default());
        let root = WindowRoot::new(config, displays.clone(), ability.clone());

        let agent = Arc::new(RecordingAgent::default());
        for category in [
            AgentCategory::Focus,
            AgentCategory::SystemBar,
            AgentCategory::WindowUpdate,
            AgentCategory::AvoidArea,
        ] {
            root.register_agent(agent.clone(), category);
        }

        Self {
            root,
            displays,
            agent,
            ability,
            next_client: 1,
            next_token: 100,
        }
    }

    pub fn root(&self) -> &WindowRoot {
        &self.root
    }

    pub fn agent(&self) -> &Arc<RecordingAgent> {
        &self.agent
    }

    pub fn ability(&self) -> &RecordingAbility {
        &self.ability
    }

    /// Add or replace a display in the provider (the root is not told)
    pub fn set_display(&self, id: DisplayId, rect: Rect) {
        self.displays.set(DisplayInfo { id, rect });
    }

    pub fn remove_display(&self, id: DisplayId) {
        self.displays.remove(id);
    }

    pub fn display_rect(&self, id: DisplayId) -> Rect {
        self.displays
            .display_info(id)
            .map(|info| info.rect)
            .unwrap_or_else(|| panic!("display {} not configured", id))
    }

    fn client(&mut self) -> ClientHandle {
        let client = ClientHandle(self.next_client);
        self.next_client += 1;
        client
    }

    /// Create a hidden window owned by a fresh client
    pub fn create(&mut self, name: &str, option: WindowOption) -> Result<WindowId, WmError> {
        let client = self.client();
        self.root.create_window(name, option, Some(client))
    }

    /// Create and show an app main window with a fresh client and token
    pub fn spawn_app_with(&mut self, mut option: WindowOption) -> AppHandle {
        let client = self.client();
        let token = AbilityToken(self.next_token);
        self.next_token += 1;
        option.ability_token = Some(token);

        let window = self
            .root
            .create_window("app", option, Some(client))
            .unwrap_or_else(|e| panic!("create app failed: {}", e));
        self.root
            .show_window(window)
            .unwrap_or_else(|e| panic!("show app failed: {}", e));
        tracing::debug!(window_id = window.0, client = client.0, token = token.0, "test app spawned");
        AppHandle { window, client, token }
    }

    pub fn spawn_app(&mut self) -> AppHandle {
        self.spawn_app_with(WindowOption::default())
    }

    /// Shown status bar across the top of display 0
    pub fn status_bar(&mut self, height: u32) -> WindowId {
        let display = self.display_rect(0);
        self.spawn_bar(WindowType::StatusBar, Rect::new(display.x, display.y, display.width, height))
    }

    /// Shown navigation bar across the bottom of display 0
    pub fn navigation_bar(&mut self, height: u32) -> WindowId {
        let display = self.display_rect(0);
        let y = display.bottom() - height as i32;
        self.spawn_bar(WindowType::NavigationBar, Rect::new(display.x, y, display.width, height))
    }

    fn spawn_bar(&mut self, window_type: WindowType, rect: Rect) -> WindowId {
        let option = WindowOption {
            window_type,
            rect,
            flags: WindowFlags::NEED_AVOID,
            focusable: false,
            ..WindowOption::default()
        };
        let id = self
            .create("bar", option)
            .unwrap_or_else(|e| panic!("create bar failed: {}", e));
        self.root
            .show_window(id)
            .unwrap_or_else(|e| panic!("show bar failed: {}", e));
        id
    }

    pub fn info(&self, id: WindowId) -> WindowInfo {
        self.root
            .window_info(id)
            .unwrap_or_else(|e| panic!("window {} not found: {}", id.0, e))
    }

    pub fn rect(&self, id: WindowId) -> Rect {
        self.info(id).rect
    }

    pub fn snapshot(&self, display_id: DisplayId) -> RootSnapshot {
        let z_order = self.root.z_order(display_id);
        let windows = z_order
            .iter()
            .filter_map(|id| self.root.window_info(*id).ok())
            .collect();
        RootSnapshot {
            z_order,
            windows,
            focused: self.root.focused_window(display_id),
            divider: self.root.divider(display_id),
            layout_mode: self.root.layout_mode(display_id),
            avoid_areas: self.root.get_avoid_area(display_id),
        }
    }

    /// Drain the events delivered so far
    pub fn take_events(&self) -> Vec<AgentEvent> {
        self.agent.take()
    }

    pub fn check(&self) -> Result<(), TestError> {
        self.root.check_invariants().map_err(TestError::Invariant)
    }
}
