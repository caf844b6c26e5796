//! Observer fan-out
//!
//! Observers ("agents") register per event category. Every state change the
//! window core publishes is one [`AgentEvent`] variant, delivered through the
//! single [`WindowManagerAgent::on_event`] entry point.
//!
//! # Delivery contract
//!
//! - Registration is idempotent per (agent, category).
//! - A broadcast snapshots the registered set first and then delivers
//!   synchronously, in registration order, without holding the registry lock.
//!   Agents registered or unregistered mid-broadcast do not affect that
//!   broadcast.
//! - Broadcasts of an empty system-bar tint list are dropped.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::avoid_area::AvoidArea;
use crate::display::DisplayId;
use crate::geometry::Rect;
use crate::window_node::{AbilityToken, SystemBarProperty, WindowId, WindowInfo, WindowType};

/// Event categories an agent can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCategory {
    Focus,
    SystemBar,
    WindowUpdate,
    AvoidArea,
}

/// Kind of change reported by a window status update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowUpdateType {
    Added,
    Removed,
    Focused,
    Bounds,
}

/// Tint one system bar should adopt over a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemBarRegionTint {
    pub bar_type: WindowType,
    pub prop: SystemBarProperty,
    pub region: Rect,
}

/// Everything the window core tells its observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    FocusChanged {
        window_id: WindowId,
        display_id: DisplayId,
        window_type: WindowType,
        ability_token: Option<AbilityToken>,
        focused: bool,
    },
    SystemBarTintsChanged {
        display_id: DisplayId,
        tints: Vec<SystemBarRegionTint>,
    },
    WindowStatusChanged {
        info: WindowInfo,
        update_type: WindowUpdateType,
    },
    AvoidAreaChanged {
        display_id: DisplayId,
        areas: Vec<AvoidArea>,
    },
}

impl AgentEvent {
    pub fn category(&self) -> AgentCategory {
        match self {
            AgentEvent::FocusChanged { .. } => AgentCategory::Focus,
            AgentEvent::SystemBarTintsChanged { .. } => AgentCategory::SystemBar,
            AgentEvent::WindowStatusChanged { .. } => AgentCategory::WindowUpdate,
            AgentEvent::AvoidAreaChanged { .. } => AgentCategory::AvoidArea,
        }
    }

    /// Events that carry nothing worth delivering
    fn is_empty(&self) -> bool {
        matches!(self, AgentEvent::SystemBarTintsChanged { tints, .. } if tints.is_empty())
    }
}

/// An observer of window manager state
pub trait WindowManagerAgent: Send + Sync {
    fn on_event(&self, event: &AgentEvent);
}

/// Category-keyed observer sets
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<BTreeMap<AgentCategory, Vec<Arc<dyn WindowManagerAgent>>>>,
}

/// Identity of an agent, independent of the trait object's vtable
fn same_agent(a: &Arc<dyn WindowManagerAgent>, b: &Arc<dyn WindowManagerAgent>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `agent` for `category`.
    ///
    /// Returns false when the agent was already registered.
    pub fn register(&self, agent: Arc<dyn WindowManagerAgent>, category: AgentCategory) -> bool {
        let mut agents = self.agents.write();
        let list = agents.entry(category).or_default();
        if list.iter().any(|existing| same_agent(existing, &agent)) {
            tracing::debug!(?category, "agent already registered");
            return false;
        }
        list.push(agent);
        tracing::debug!(?category, count = list.len(), "agent registered");
        true
    }

    /// Remove `agent` from `category`. Returns false when it was not there.
    pub fn unregister(&self, agent: &Arc<dyn WindowManagerAgent>, category: AgentCategory) -> bool {
        let mut agents = self.agents.write();
        let Some(list) = agents.get_mut(&category) else {
            return false;
        };
        let before = list.len();
        list.retain(|existing| !same_agent(existing, agent));
        let removed = list.len() != before;
        if list.is_empty() {
            agents.remove(&category);
        }
        if removed {
            tracing::debug!(?category, "agent unregistered");
        }
        removed
    }

    /// Snapshot of the agents registered for `category`, in registration order
    pub fn agents(&self, category: AgentCategory) -> Vec<Arc<dyn WindowManagerAgent>> {
        self.agents.read().get(&category).cloned().unwrap_or_default()
    }

    pub fn agent_count(&self, category: AgentCategory) -> usize {
        self.agents.read().get(&category).map_or(0, Vec::len)
    }

    /// Deliver `event` to every agent of its category.
    ///
    /// Returns the number of agents the event was delivered to.
    pub fn broadcast(&self, event: &AgentEvent) -> usize {
        if event.is_empty() {
            tracing::trace!(category = ?event.category(), "empty event suppressed");
            return 0;
        }
        let snapshot = self.agents(event.category());
        for agent in &snapshot {
            agent.on_event(event);
        }
        snapshot.len()
    }
}
