//! Server-side mirror of a client window
//!
//! `WindowNode` is plain data. All behaviour lives in the container that owns
//! the node; this module only defines the node, its enums and flag sets, and
//! the creation options a client passes in.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::display::DisplayId;
use crate::geometry::Rect;

/// Process-unique window identifier. Zero is never allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u32);

/// Opaque handle of the client process owning a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientHandle(pub u64);

/// Opaque handle the ability lifecycle service uses to address an app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityToken(pub u64);

/// Hands out window ids. Shared by the root and every container.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: AtomicU32::new(1) }
    }

    pub fn allocate(&self) -> WindowId {
        WindowId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Layout mode of a single window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    Fullscreen,
    Floating,
    SplitPrimary,
    SplitSecondary,
}

impl WindowMode {
    /// Fallback order used when a requested mode is unsupported
    pub const PRIORITY: [WindowMode; 4] = [
        WindowMode::Fullscreen,
        WindowMode::Floating,
        WindowMode::SplitPrimary,
        WindowMode::SplitSecondary,
    ];

    pub fn is_split(self) -> bool {
        matches!(self, WindowMode::SplitPrimary | WindowMode::SplitSecondary)
    }

    /// The other half of a split pair
    pub fn split_counterpart(self) -> Option<WindowMode> {
        match self {
            WindowMode::SplitPrimary => Some(WindowMode::SplitSecondary),
            WindowMode::SplitSecondary => Some(WindowMode::SplitPrimary),
            _ => None,
        }
    }

    pub fn support_bit(self) -> ModeSupport {
        match self {
            WindowMode::Fullscreen => ModeSupport::FULLSCREEN,
            WindowMode::Floating => ModeSupport::FLOATING,
            WindowMode::SplitPrimary => ModeSupport::SPLIT_PRIMARY,
            WindowMode::SplitSecondary => ModeSupport::SPLIT_SECONDARY,
        }
    }
}

bitflags! {
    /// Set of modes a window declares it can adopt
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ModeSupport: u32 {
        const FULLSCREEN = 1 << 0;
        const FLOATING = 1 << 1;
        const SPLIT_PRIMARY = 1 << 2;
        const SPLIT_SECONDARY = 1 << 3;
        const ALL = Self::FULLSCREEN.bits()
            | Self::FLOATING.bits()
            | Self::SPLIT_PRIMARY.bits()
            | Self::SPLIT_SECONDARY.bits();
    }
}

impl ModeSupport {
    pub fn supports(self, mode: WindowMode) -> bool {
        self.contains(mode.support_bit())
    }
}

bitflags! {
    /// Behaviour flags set by the client
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct WindowFlags: u32 {
        /// Contributes to (system types) or respects (app types) avoid areas
        const NEED_AVOID = 1 << 0;
        /// Children are clamped to this window's bounds
        const PARENT_LIMIT = 1 << 1;
        /// The split divider may not move while this window is paired
        const FORBID_SPLIT_MOVE = 1 << 2;
    }
}

/// Window type, which decides the z bucket and avoid eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    AppMain,
    AppSub,
    Desktop,
    StatusBar,
    NavigationBar,
    DockSlice,
    InputMethod,
    SystemAlert,
    Pointer,
}

impl WindowType {
    pub fn z_bucket(self) -> ZBucket {
        match self {
            WindowType::Desktop => ZBucket::BelowApp,
            WindowType::AppMain | WindowType::AppSub => ZBucket::App,
            WindowType::DockSlice | WindowType::InputMethod => ZBucket::AboveApp,
            WindowType::StatusBar
            | WindowType::NavigationBar
            | WindowType::SystemAlert
            | WindowType::Pointer => ZBucket::System,
        }
    }

    /// Types allowed to reserve screen edges
    pub fn is_avoid_eligible(self) -> bool {
        matches!(
            self,
            WindowType::StatusBar
                | WindowType::NavigationBar
                | WindowType::InputMethod
                | WindowType::DockSlice
        )
    }

    pub fn is_system_bar(self) -> bool {
        matches!(self, WindowType::StatusBar | WindowType::NavigationBar)
    }
}

/// Layering class. Buckets stack in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZBucket {
    BelowApp,
    App,
    AboveApp,
    System,
}

/// Appearance a window asks of a system bar while it is the top window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemBarProperty {
    pub enable: bool,
    /// ARGB
    pub background_color: u32,
    /// ARGB
    pub content_color: u32,
}

impl Default for SystemBarProperty {
    fn default() -> Self {
        Self {
            enable: true,
            background_color: 0x6600_0000,
            content_color: 0xffee_eeee,
        }
    }
}

/// Creation options sent with a create-window request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowOption {
    pub rect: Rect,
    pub window_type: WindowType,
    pub mode: WindowMode,
    pub mode_support: ModeSupport,
    pub flags: WindowFlags,
    pub focusable: bool,
    pub touchable: bool,
    pub display_id: DisplayId,
    pub parent_id: Option<WindowId>,
    pub ability_token: Option<AbilityToken>,
    pub system_bar_props: BTreeMap<WindowType, SystemBarProperty>,
}

impl Default for WindowOption {
    fn default() -> Self {
        Self {
            rect: Rect::default(),
            window_type: WindowType::AppMain,
            mode: WindowMode::Fullscreen,
            mode_support: ModeSupport::ALL,
            flags: WindowFlags::NEED_AVOID,
            focusable: true,
            touchable: true,
            display_id: 0,
            parent_id: None,
            ability_token: None,
            system_bar_props: BTreeMap::new(),
        }
    }
}

/// One window as the server sees it
#[derive(Debug, Clone)]
pub struct WindowNode {
    pub id: WindowId,
    pub name: String,
    pub display_id: DisplayId,
    pub parent_id: Option<WindowId>,
    /// Child ids, oldest first
    pub children: Vec<WindowId>,
    pub z_bucket: ZBucket,
    pub z_index: u32,
    /// Rect the client asked for
    pub request_rect: Rect,
    /// Rect the layout assigned
    pub rect: Rect,
    /// Mode the client asked for
    pub requested_mode: WindowMode,
    /// Mode in effect after resolution
    pub mode: WindowMode,
    pub mode_support: ModeSupport,
    pub flags: WindowFlags,
    pub focusable: bool,
    pub touchable: bool,
    pub window_type: WindowType,
    pub client: Option<ClientHandle>,
    pub ability_token: Option<AbilityToken>,
    pub starting_window_shown: bool,
    pub visible: bool,
    pub focused: bool,
    pub system_bar_props: BTreeMap<WindowType, SystemBarProperty>,
}

impl WindowNode {
    /// Build a hidden node from creation options
    pub fn new(id: WindowId, name: &str, option: &WindowOption, client: Option<ClientHandle>) -> Self {
        Self {
            id,
            name: name.to_string(),
            display_id: option.display_id,
            parent_id: option.parent_id,
            children: Vec::new(),
            z_bucket: option.window_type.z_bucket(),
            z_index: 0,
            request_rect: option.rect,
            rect: option.rect,
            requested_mode: option.mode,
            mode: option.mode,
            mode_support: option.mode_support,
            flags: option.flags,
            focusable: option.focusable,
            touchable: option.touchable,
            window_type: option.window_type,
            client,
            ability_token: option.ability_token,
            starting_window_shown: false,
            visible: false,
            focused: false,
            system_bar_props: option.system_bar_props.clone(),
        }
    }

    /// Top-level application window (the only kind that takes part in
    /// fullscreen, split and tile arbitration)
    pub fn is_main_app(&self) -> bool {
        self.window_type == WindowType::AppMain && self.parent_id.is_none()
    }

    pub fn has_flag(&self, flag: WindowFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn info(&self) -> WindowInfo {
        WindowInfo {
            window_id: self.id,
            display_id: self.display_id,
            rect: self.rect,
            mode: self.mode,
            window_type: self.window_type,
            visible: self.visible,
            focused: self.focused,
        }
    }
}

/// Summary of a window sent to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub window_id: WindowId,
    pub display_id: DisplayId,
    pub rect: Rect,
    pub mode: WindowMode,
    pub window_type: WindowType,
    pub visible: bool,
    pub focused: bool,
}
