//! Minimize request batching
//!
//! Layout decisions mark windows for minimization under a reason; the root
//! flushes the batch once the mutation that produced it has finished. The
//! ability lifecycle service then suspends the app (fire and forget).
//!
//! Queues hold window ids rather than nodes: a window destroyed before the
//! flush simply no longer resolves and is skipped.
//!
//! Flushing calls out to the ability service, which may call straight back
//! into [`MinimizeBatcher::enqueue`] on the same thread, so the state sits
//! behind a re-entrant lock. Enqueues made during a flush land in fresh
//! buckets and go out with the next flush.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::window_node::{AbilityToken, WindowId};

/// Why a window is being minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinimizeReason {
    MinimizeButton,
    MinimizeAll,
    LayoutTile,
    LayoutCascade,
    MaxAppCount,
    SplitReplace,
    SplitQuit,
    GestureAnimation,
    OtherWindow,
    InvalidModeOrSizeInTile,
}

impl MinimizeReason {
    /// Reasons that come straight from a user gesture
    pub fn is_from_user(self) -> bool {
        matches!(
            self,
            MinimizeReason::MinimizeButton | MinimizeReason::MinimizeAll | MinimizeReason::GestureAnimation
        )
    }
}

/// Errors reported by the ability lifecycle service
#[derive(Debug, Error)]
pub enum AbilityError {
    #[error("ability not found")]
    NotFound,

    #[error("ability service unavailable: {0}")]
    Unavailable(String),
}

/// Narrow view of the ability lifecycle service
pub trait AbilityManager: Send + Sync {
    fn minimize_ability(&self, token: AbilityToken, from_user: bool) -> Result<(), AbilityError>;
}

/// Resolves queued ids to the token to minimize.
///
/// Returns `None` for windows that no longer exist, have no ability token,
/// or are still showing their starting window.
pub trait MinimizeTargetSource {
    fn minimize_target(&self, id: WindowId) -> Option<AbilityToken>;
}

#[derive(Debug)]
struct MinimizeState {
    queues: BTreeMap<MinimizeReason, Vec<WindowId>>,
    minimize_by_other_window: bool,
}

/// Process-wide, reason-partitioned minimize queue
pub struct MinimizeBatcher {
    state: ReentrantMutex<RefCell<MinimizeState>>,
    ability: Arc<dyn AbilityManager>,
}

impl MinimizeBatcher {
    pub fn new(ability: Arc<dyn AbilityManager>, minimize_by_other_window: bool) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(MinimizeState {
                queues: BTreeMap::new(),
                minimize_by_other_window,
            })),
            ability,
        }
    }

    pub fn set_minimize_by_other_window(&self, allowed: bool) {
        let guard = self.state.lock();
        guard.borrow_mut().minimize_by_other_window = allowed;
    }

    /// Queue `id` under `reason`.
    ///
    /// Non-user reasons are dropped while minimize-by-other-window is off.
    /// Duplicates are kept here and filtered when flushing.
    pub fn enqueue(&self, id: WindowId, reason: MinimizeReason) -> bool {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if !state.minimize_by_other_window && !reason.is_from_user() {
            tracing::debug!(window_id = id.0, ?reason, "minimize by other window disabled, dropped");
            return false;
        }
        tracing::info!(window_id = id.0, ?reason, "window queued for minimize");
        state.queues.entry(reason).or_default().push(id);
        true
    }

    /// Issue every queued request and clear all buckets.
    ///
    /// Returns the number of minimize requests issued.
    pub fn flush_all(&self, nodes: &dyn MinimizeTargetSource) -> usize {
        let guard = self.state.lock();
        let batches = std::mem::take(&mut guard.borrow_mut().queues);
        let mut issued = HashSet::new();
        for (reason, ids) in batches {
            self.issue(reason, ids, nodes, &mut issued);
        }
        issued.len()
    }

    /// Issue and clear one bucket, leaving the others untouched
    pub fn flush_reason(&self, reason: MinimizeReason, nodes: &dyn MinimizeTargetSource) -> usize {
        let guard = self.state.lock();
        let ids = guard.borrow_mut().queues.remove(&reason).unwrap_or_default();
        let mut issued = HashSet::new();
        self.issue(reason, ids, nodes, &mut issued);
        issued.len()
    }

    /// Drop one bucket without issuing anything
    pub fn cancel_reason(&self, reason: MinimizeReason) {
        let guard = self.state.lock();
        let dropped = guard.borrow_mut().queues.remove(&reason);
        if let Some(ids) = dropped {
            tracing::debug!(?reason, dropped = ids.len(), "minimize bucket cancelled");
        }
    }

    /// Forget `id` in every bucket (window destroyed)
    pub fn remove(&self, id: WindowId) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        for ids in state.queues.values_mut() {
            ids.retain(|queued| *queued != id);
        }
        state.queues.retain(|_, ids| !ids.is_empty());
    }

    pub fn is_queued(&self, id: WindowId) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.queues.values().any(|ids| ids.contains(&id))
    }

    pub fn queued(&self, reason: MinimizeReason) -> Vec<WindowId> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.queues.get(&reason).cloned().unwrap_or_default()
    }

    /// Called with the state lock held but not borrowed, so the ability
    /// service may re-enter `enqueue`.
    fn issue(
        &self,
        reason: MinimizeReason,
        ids: Vec<WindowId>,
        nodes: &dyn MinimizeTargetSource,
        issued: &mut HashSet<WindowId>,
    ) {
        let from_user = reason.is_from_user();
        for id in ids {
            if issued.contains(&id) {
                continue;
            }
            let Some(token) = nodes.minimize_target(id) else {
                tracing::debug!(window_id = id.0, ?reason, "minimize target gone, skipped");
                continue;
            };
            issued.insert(id);
            tracing::info!(window_id = id.0, ?reason, "minimizing window");
            if let Err(e) = self.ability.minimize_ability(token, from_user) {
                tracing::warn!(window_id = id.0, error = %e, "ability service rejected minimize");
            }
        }
    }
}
