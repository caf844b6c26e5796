//! Display geometry source
//!
//! The screen manager owns display geometry. The window core only asks it for
//! the rect of a display when a container is created or the display changes.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

pub type DisplayId = u64;

/// Geometry of one display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: DisplayId,
    pub rect: Rect,
}

/// Narrow view of the display manager
pub trait DisplayProvider: Send + Sync {
    fn display_info(&self, display_id: DisplayId) -> Option<DisplayInfo>;
}

/// Display source backed by an in-memory table
#[derive(Debug, Default)]
pub struct StaticDisplays {
    displays: RwLock<BTreeMap<DisplayId, DisplayInfo>>,
}

impl StaticDisplays {
    pub fn new(displays: impl IntoIterator<Item = DisplayInfo>) -> Self {
        Self {
            displays: RwLock::new(displays.into_iter().map(|d| (d.id, d)).collect()),
        }
    }

    /// Add or replace a display
    pub fn set(&self, info: DisplayInfo) {
        self.displays.write().insert(info.id, info);
    }

    pub fn remove(&self, display_id: DisplayId) -> Option<DisplayInfo> {
        self.displays.write().remove(&display_id)
    }
}

impl DisplayProvider for StaticDisplays {
    fn display_info(&self, display_id: DisplayId) -> Option<DisplayInfo> {
        self.displays.read().get(&display_id).copied()
    }
}
