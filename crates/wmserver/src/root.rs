//! Root registry
//!
//! `WindowRoot` is the service object every request goes through. It owns
//! one container per display (created on first use), the global indexes
//! tying window ids and client handles to displays, the agent registry and
//! the minimize batcher.
//!
//! # Locking
//!
//! - Index lookups are finished before a container lock is taken.
//! - While a container is locked, only the index may also be locked.
//! - The batcher and the agent registry are only touched once every
//!   container lock is released, so agents and the ability service may call
//!   straight back into the root.
//! - Event delivery and minimize flushing run under one reentrant delivery
//!   lock with a single drainer. A nested settle on the draining thread only
//!   queues its work; the outermost frame delivers it, so agents see events
//!   in commit order.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::agent::{AgentCategory, AgentEvent, AgentRegistry, WindowManagerAgent};
use crate::avoid_area::{AvoidArea, AvoidControlOp, AvoidEdge};
use crate::config::WmConfig;
use crate::container::{check_rect, ContainerChanges, LayoutMode, PointerEvent, WindowNodeContainer};
use crate::display::{DisplayId, DisplayProvider};
use crate::error::{WmError, WmResult};
use crate::geometry::Rect;
use crate::minimize::{AbilityManager, MinimizeBatcher, MinimizeTargetSource};
use crate::window_node::{
    AbilityToken, ClientHandle, IdAllocator, ModeSupport, SystemBarProperty, WindowFlags, WindowId,
    WindowInfo, WindowMode, WindowNode, WindowOption, WindowType,
};

/// How many client-death victims are remembered for DeadClient replies.
/// Older ids fall back to InvalidParam.
const MAX_REAPED_WINDOWS: usize = 1024;

/// Windows removed because their client died, oldest evicted first
#[derive(Debug, Default)]
struct ReapedWindows {
    order: VecDeque<WindowId>,
    ids: HashSet<WindowId>,
}

impl ReapedWindows {
    fn insert(&mut self, id: WindowId) {
        if !self.ids.insert(id) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > MAX_REAPED_WINDOWS {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
    }

    fn contains(&self, id: &WindowId) -> bool {
        self.ids.contains(id)
    }
}

impl Extend<WindowId> for ReapedWindows {
    fn extend<I: IntoIterator<Item = WindowId>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

/// Global id and client indexes
#[derive(Debug, Default)]
struct WindowIndex {
    windows: HashMap<WindowId, DisplayId>,
    clients: HashMap<ClientHandle, WindowId>,
    window_clients: HashMap<WindowId, ClientHandle>,
    reaped: ReapedWindows,
}

impl WindowIndex {
    fn save_node(&mut self, id: WindowId, display_id: DisplayId, client: Option<ClientHandle>) -> WmResult<()> {
        if self.windows.contains_key(&id) {
            return Err(WmError::RepeatOperation(format!("window {} already indexed", id.0)));
        }
        if let Some(client) = client {
            if self.clients.contains_key(&client) {
                return Err(WmError::RepeatOperation(format!("client {} already owns a window", client.0)));
            }
            self.clients.insert(client, id);
            self.window_clients.insert(id, client);
        }
        self.windows.insert(id, display_id);
        Ok(())
    }

    fn forget(&mut self, id: WindowId) {
        self.windows.remove(&id);
        if let Some(client) = self.window_clients.remove(&id) {
            self.clients.remove(&client);
        }
    }

    fn apply(&mut self, display_id: DisplayId, changes: &ContainerChanges) {
        for id in &changes.created {
            self.windows.insert(*id, display_id);
        }
        for id in &changes.destroyed {
            self.forget(*id);
        }
    }
}

pub struct WindowRoot {
    config: WmConfig,
    displays: Arc<dyn DisplayProvider>,
    containers: RwLock<BTreeMap<DisplayId, Arc<Mutex<WindowNodeContainer>>>>,
    index: Mutex<WindowIndex>,
    ids: Arc<IdAllocator>,
    agents: AgentRegistry,
    minimize: MinimizeBatcher,
    events: Sender<AgentEvent>,
    inbox: Mutex<Receiver<AgentEvent>>,
    /// Set while a frame on the holding thread is draining
    delivery: ReentrantMutex<Cell<bool>>,
}

/// Clears the draining flag when the outermost drain ends, even on unwind
struct Draining<'a>(&'a Cell<bool>);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl WindowRoot {
    pub fn new(config: WmConfig, displays: Arc<dyn DisplayProvider>, ability: Arc<dyn AbilityManager>) -> Self {
        let (events, inbox) = channel();
        let minimize = MinimizeBatcher::new(ability, config.minimize_by_other_window);
        Self {
            config,
            displays,
            containers: RwLock::new(BTreeMap::new()),
            index: Mutex::new(WindowIndex::default()),
            ids: Arc::new(IdAllocator::new()),
            agents: AgentRegistry::new(),
            minimize,
            events,
            inbox: Mutex::new(inbox),
            delivery: ReentrantMutex::new(Cell::new(false)),
        }
    }

    pub fn config(&self) -> &WmConfig {
        &self.config
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn minimize(&self) -> &MinimizeBatcher {
        &self.minimize
    }

    fn container(&self, display_id: DisplayId) -> Option<Arc<Mutex<WindowNodeContainer>>> {
        self.containers.read().get(&display_id).cloned()
    }

    /// Container for `display_id`, created on first use
    pub fn get_or_create_container(&self, display_id: DisplayId) -> WmResult<Arc<Mutex<WindowNodeContainer>>> {
        if let Some(container) = self.container(display_id) {
            return Ok(container);
        }
        let display = self
            .displays
            .display_info(display_id)
            .ok_or_else(|| WmError::InvalidParam(format!("unknown display {}", display_id)))?;

        let mut containers = self.containers.write();
        let container = containers.entry(display_id).or_insert_with(|| {
            Arc::new(Mutex::new(WindowNodeContainer::new(
                display,
                self.config.layout.clone(),
                self.ids.clone(),
                self.events.clone(),
            )))
        });
        Ok(container.clone())
    }

    /// Display currently holding `id`
    fn locate(&self, id: WindowId) -> WmResult<DisplayId> {
        let index = self.index.lock();
        if let Some(display_id) = index.windows.get(&id) {
            return Ok(*display_id);
        }
        if index.reaped.contains(&id) {
            return Err(WmError::DeadClient(id));
        }
        Err(WmError::InvalidParam(format!("unknown window {}", id.0)))
    }

    /// Run `op` under the display's mutation authority, then settle its
    /// side effects with every container lock released
    fn with_container<T>(
        &self,
        display_id: DisplayId,
        op: impl FnOnce(&mut WindowNodeContainer) -> WmResult<T>,
    ) -> WmResult<T> {
        let container = self
            .container(display_id)
            .ok_or_else(|| WmError::InvalidParam(format!("unknown display {}", display_id)))?;

        let (result, changes) = {
            let mut container = container.lock();
            let result = op(&mut container);
            let changes = container.take_changes();
            // The index follows the container under its lock. Destroyed ids
            // leave the batcher later in `settle`; until then they resolve to
            // no minimize target.
            if !changes.is_empty() {
                self.index.lock().apply(display_id, &changes);
            }
            (result, changes)
        };

        self.settle(changes);
        result
    }

    /// `with_container` for the display owning `id`
    fn with_window<T>(
        &self,
        id: WindowId,
        op: &'static str,
        f: impl FnOnce(&mut WindowNodeContainer) -> WmResult<T>,
    ) -> WmResult<T> {
        let result = self.locate(id).and_then(|display_id| self.with_container(display_id, f));
        // Lost a race with client-death cleanup
        let result = match result {
            Err(WmError::InvalidParam(_)) if self.index.lock().reaped.contains(&id) => Err(WmError::DeadClient(id)),
            other => other,
        };
        match &result {
            Ok(_) => tracing::debug!(op, window_id = id.0, "request applied"),
            Err(WmError::DeadClient(_)) => tracing::debug!(op, window_id = id.0, "window already reaped"),
            Err(e) => tracing::warn!(op, window_id = id.0, error = %e, "request rejected"),
        }
        result
    }

    fn settle(&self, changes: ContainerChanges) {
        for id in &changes.destroyed {
            self.minimize.remove(*id);
        }
        for (id, reason) in changes.minimize {
            self.minimize.enqueue(id, reason);
        }

        let delivery = self.delivery.lock();
        if delivery.replace(true) {
            return;
        }
        let _draining = Draining(&delivery);
        // Flushing may re-enter through the ability service and queue more
        loop {
            self.dispatch_events();
            if self.minimize.flush_all(self) == 0 {
                break;
            }
        }
    }

    /// Deliver queued container events to agents
    fn dispatch_events(&self) {
        loop {
            let next = self.inbox.lock().try_recv();
            let Ok(event) = next else {
                break;
            };
            self.agents.broadcast(&event);
        }
    }

    pub fn create_window(
        &self,
        name: &str,
        mut option: WindowOption,
        client: Option<ClientHandle>,
    ) -> WmResult<WindowId> {
        if option.window_type == WindowType::DockSlice {
            tracing::warn!(name, "client tried to create a divider window");
            return Err(WmError::NotPermitted("dock slice windows are server-owned".to_string()));
        }
        check_rect(&option.rect)?;
        option.parent_id = option.parent_id.filter(|parent| parent.0 != 0);
        let display_id = option.display_id;

        if let Some(parent) = option.parent_id {
            if let Ok(parent_display) = self.locate(parent) {
                if parent_display != display_id {
                    return Err(WmError::InvalidParam(format!(
                        "parent {} is on display {}, not {}",
                        parent.0, parent_display, display_id
                    )));
                }
            }
        }

        self.get_or_create_container(display_id)?;
        let result = self.with_container(display_id, |container| {
            container.check_parent(option.parent_id)?;
            let mut index = self.index.lock();
            if let Some(client) = client {
                if index.clients.contains_key(&client) {
                    return Err(WmError::RepeatOperation(format!("client {} already owns a window", client.0)));
                }
            }
            let id = self.ids.allocate();
            index.save_node(id, display_id, client)?;
            let node = WindowNode::new(id, name, &option, client);
            if let Err(e) = container.add_node(option.parent_id, node) {
                index.forget(id);
                return Err(e);
            }
            Ok(id)
        });

        match &result {
            Ok(id) => tracing::info!(name, window_id = id.0, display_id, "window created"),
            Err(e) => tracing::warn!(name, display_id, error = %e, "create window rejected"),
        }
        result
    }

    pub fn destroy_window(&self, id: WindowId) -> WmResult<()> {
        match self.with_window(id, "destroy", |container| container.remove_node(id)) {
            Ok(_) | Err(WmError::DeadClient(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn show_window(&self, id: WindowId) -> WmResult<()> {
        self.with_window(id, "show", |container| container.show_node(id))
    }

    pub fn hide_window(&self, id: WindowId) -> WmResult<()> {
        match self.with_window(id, "hide", |container| container.hide_node(id)) {
            Err(WmError::DeadClient(_)) => Ok(()),
            other => other,
        }
    }

    pub fn move_to(&self, id: WindowId, x: i32, y: i32) -> WmResult<()> {
        self.with_window(id, "move", |container| container.move_to(id, x, y))
    }

    pub fn resize(&self, id: WindowId, width: u32, height: u32) -> WmResult<()> {
        self.with_window(id, "resize", |container| container.resize(id, width, height))
    }

    pub fn set_window_mode(&self, id: WindowId, mode: WindowMode) -> WmResult<()> {
        self.with_window(id, "set_window_mode", |container| container.set_window_mode(id, mode))
    }

    pub fn set_mode_support_info(&self, id: WindowId, mask: ModeSupport) -> WmResult<()> {
        self.with_window(id, "set_mode_support_info", |container| container.set_mode_support(id, mask))
    }

    pub fn set_window_flags(&self, id: WindowId, flags: WindowFlags) -> WmResult<()> {
        self.with_window(id, "set_window_flags", |container| container.set_flags(id, flags))
    }

    pub fn request_focus(&self, id: WindowId) -> WmResult<()> {
        self.with_window(id, "request_focus", |container| container.request_focus(id))
    }

    pub fn consume_pointer_event(&self, id: WindowId, event: PointerEvent) -> WmResult<()> {
        self.with_window(id, "pointer_event", |container| container.consume_pointer_event(id, event))
    }

    pub fn avoid_control(&self, id: WindowId, op: AvoidControlOp) -> WmResult<()> {
        self.with_window(id, "avoid_control", |container| container.avoid_control(id, op))
            .map(|_| ())
    }

    pub fn set_starting_window_shown(&self, id: WindowId, shown: bool) -> WmResult<()> {
        self.with_window(id, "set_starting_window_shown", |container| {
            container.set_starting_window_shown(id, shown)
        })
    }

    pub fn set_system_bar_property(
        &self,
        id: WindowId,
        bar_type: WindowType,
        prop: SystemBarProperty,
    ) -> WmResult<()> {
        self.with_window(id, "set_system_bar_property", |container| {
            container.set_system_bar_property(id, bar_type, prop)
        })
    }

    pub fn set_layout_mode(&self, display_id: DisplayId, mode: LayoutMode) -> WmResult<()> {
        self.with_container(display_id, |container| {
            container.set_layout_mode(mode);
            Ok(())
        })
    }

    /// Minimize every visible main window of a display. Returns how many
    /// were queued.
    pub fn minimize_all(&self, display_id: DisplayId) -> WmResult<usize> {
        let queued = self.with_container(display_id, |container| Ok(container.minimize_all()))?;
        tracing::info!(display_id, queued, "minimize all");
        Ok(queued)
    }

    /// Returns true when the agent was not yet registered for `category`
    pub fn register_agent(&self, agent: Arc<dyn WindowManagerAgent>, category: AgentCategory) -> bool {
        self.agents.register(agent, category)
    }

    pub fn unregister_agent(&self, agent: &Arc<dyn WindowManagerAgent>, category: AgentCategory) -> bool {
        self.agents.unregister(agent, category)
    }

    /// Tear down everything owned by a disconnected client.
    ///
    /// Returns the number of windows removed.
    pub fn handle_client_death(&self, client: ClientHandle) -> usize {
        let target = {
            let index = self.index.lock();
            index
                .clients
                .get(&client)
                .and_then(|id| index.windows.get(id).map(|display_id| (*id, *display_id)))
        };
        let Some((id, display_id)) = target else {
            tracing::debug!(client = client.0, "dead client owns no window");
            return 0;
        };

        let result = self.with_container(display_id, |container| {
            let removed = container.remove_node(id)?;
            self.index.lock().reaped.extend(removed.iter().copied());
            Ok(removed)
        });
        match result {
            Ok(removed) => {
                tracing::info!(client = client.0, window_id = id.0, removed = removed.len(), "client died, windows reaped");
                removed.len()
            }
            Err(e) => {
                tracing::warn!(client = client.0, window_id = id.0, error = %e, "client death cleanup failed");
                0
            }
        }
    }

    /// Display gone: destroy its container and every node on it.
    ///
    /// Returns the number of windows removed.
    pub fn notify_display_removed(&self, display_id: DisplayId) -> usize {
        let Some(container) = self.containers.write().remove(&display_id) else {
            return 0;
        };
        let changes = {
            let mut container = container.lock();
            container.destroy_all();
            let changes = container.take_changes();
            self.index.lock().apply(display_id, &changes);
            changes
        };
        let removed = changes.destroyed.len();
        tracing::info!(display_id, removed, "display removed");
        self.settle(changes);
        removed
    }

    /// Display geometry changed: re-read it and lay the container out again
    pub fn notify_display_changed(&self, display_id: DisplayId) -> WmResult<()> {
        let display = self
            .displays
            .display_info(display_id)
            .ok_or_else(|| WmError::InvalidParam(format!("unknown display {}", display_id)))?;
        if self.container(display_id).is_none() {
            return Ok(());
        }
        self.with_container(display_id, |container| {
            container.update_display_rect(display);
            Ok(())
        })
    }

    /// Snapshot of one window
    pub fn window(&self, id: WindowId) -> Option<WindowNode> {
        let display_id = self.locate(id).ok()?;
        let container = self.container(display_id)?;
        let container = container.lock();
        container.node(id).cloned()
    }

    pub fn window_info(&self, id: WindowId) -> WmResult<WindowInfo> {
        self.window(id)
            .map(|node| node.info())
            .ok_or_else(|| WmError::InvalidParam(format!("unknown window {}", id.0)))
    }

    pub fn window_count(&self) -> usize {
        self.index.lock().windows.len()
    }

    fn read_container<T>(&self, display_id: DisplayId, f: impl FnOnce(&WindowNodeContainer) -> T) -> Option<T> {
        let container = self.container(display_id)?;
        let container = container.lock();
        Some(f(&container))
    }

    /// Window ids of a display, bottom to top
    pub fn z_order(&self, display_id: DisplayId) -> Vec<WindowId> {
        self.read_container(display_id, WindowNodeContainer::z_order).unwrap_or_default()
    }

    pub fn focused_window(&self, display_id: DisplayId) -> Option<WindowId> {
        self.read_container(display_id, WindowNodeContainer::focused).flatten()
    }

    pub fn divider(&self, display_id: DisplayId) -> Option<WindowId> {
        self.read_container(display_id, WindowNodeContainer::divider_id).flatten()
    }

    pub fn layout_mode(&self, display_id: DisplayId) -> Option<LayoutMode> {
        self.read_container(display_id, WindowNodeContainer::layout_mode)
    }

    pub fn get_avoid_area(&self, display_id: DisplayId) -> Vec<AvoidArea> {
        self.read_container(display_id, WindowNodeContainer::get_avoid_area).unwrap_or_default()
    }

    pub fn get_avoid_area_by_type(&self, display_id: DisplayId, edge: AvoidEdge) -> Option<Rect> {
        self.read_container(display_id, |container| container.get_avoid_area_by_type(edge)).flatten()
    }

    /// Check container and index invariants (for testing)
    pub fn check_invariants(&self) -> Result<(), String> {
        let containers: Vec<(DisplayId, Arc<Mutex<WindowNodeContainer>>)> = self
            .containers
            .read()
            .iter()
            .map(|(id, container)| (*id, container.clone()))
            .collect();

        let mut live = HashMap::new();
        for (display_id, container) in containers {
            let container = container.lock();
            container
                .check_invariants()
                .map_err(|e| format!("display {}: {}", display_id, e))?;
            for id in container.z_order() {
                if live.insert(id, display_id).is_some() {
                    return Err(format!("window {} lives on two displays", id.0));
                }
            }
        }

        let index = self.index.lock();
        if index.windows != live {
            return Err(format!(
                "index holds {} windows, containers hold {}",
                index.windows.len(),
                live.len()
            ));
        }
        for (client, id) in &index.clients {
            if index.window_clients.get(id) != Some(client) {
                return Err(format!("client {} and window {} index mismatch", client.0, id.0));
            }
            if !index.windows.contains_key(id) {
                return Err(format!("client {} maps to dead window {}", client.0, id.0));
            }
        }
        Ok(())
    }
}

impl MinimizeTargetSource for WindowRoot {
    fn minimize_target(&self, id: WindowId) -> Option<AbilityToken> {
        let display_id = self.index.lock().windows.get(&id).copied()?;
        self.read_container(display_id, |container| {
            container
                .node(id)
                .filter(|node| !node.starting_window_shown)
                .and_then(|node| node.ability_token)
        })
        .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayInfo, StaticDisplays};
    use crate::minimize::{AbilityError, MinimizeReason};

    #[derive(Default)]
    struct Ability {
        requests: Mutex<Vec<(AbilityToken, bool)>>,
    }

    impl AbilityManager for Ability {
        fn minimize_ability(&self, token: AbilityToken, from_user: bool) -> Result<(), AbilityError> {
            self.requests.lock().push((token, from_user));
            Ok(())
        }
    }

    fn root() -> (WindowRoot, Arc<Ability>) {
        let displays = Arc::new(StaticDisplays::new([DisplayInfo {
            id: 0,
            rect: Rect::new(0, 0, 1280, 720),
        }]));
        let ability = Arc::new(Ability::default());
        (WindowRoot::new(WmConfig::default(), displays, ability.clone()), ability)
    }

    #[test]
    fn index_rejects_duplicate_id_and_client() {
        let mut index = WindowIndex::default();
        index.save_node(WindowId(1), 0, Some(ClientHandle(7))).unwrap();

        assert!(matches!(index.save_node(WindowId(1), 0, None), Err(WmError::RepeatOperation(_))));
        assert!(matches!(
            index.save_node(WindowId(2), 0, Some(ClientHandle(7))),
            Err(WmError::RepeatOperation(_))
        ));
        assert!(!index.windows.contains_key(&WindowId(2)));

        index.forget(WindowId(1));
        assert!(index.clients.is_empty());
        assert!(index.window_clients.is_empty());
    }

    #[test]
    fn reaped_set_evicts_oldest() {
        let mut reaped = ReapedWindows::default();
        reaped.extend((1..=MAX_REAPED_WINDOWS as u32 + 10).map(WindowId));
        reaped.insert(WindowId(20));

        assert_eq!(reaped.ids.len(), MAX_REAPED_WINDOWS);
        assert_eq!(reaped.order.len(), MAX_REAPED_WINDOWS);
        assert!(!reaped.contains(&WindowId(1)));
        assert!(!reaped.contains(&WindowId(10)));
        assert!(reaped.contains(&WindowId(11)));
        assert!(reaped.contains(&WindowId(MAX_REAPED_WINDOWS as u32 + 10)));
    }

    #[test]
    fn evicted_reaped_window_reports_invalid_param() {
        let (root, _) = root();
        let first = root.create_window("w", WindowOption::default(), Some(ClientHandle(1))).unwrap();
        root.handle_client_death(ClientHandle(1));
        assert!(matches!(root.show_window(first), Err(WmError::DeadClient(_))));

        for n in 0..MAX_REAPED_WINDOWS as u64 {
            let client = ClientHandle(100 + n);
            root.create_window("w", WindowOption::default(), Some(client)).unwrap();
            root.handle_client_death(client);
        }

        assert!(matches!(root.show_window(first), Err(WmError::InvalidParam(_))));
        assert!(matches!(root.destroy_window(first), Err(WmError::InvalidParam(_))));
        assert_eq!(root.index.lock().reaped.ids.len(), MAX_REAPED_WINDOWS);
    }

    #[test]
    fn create_on_unknown_display_allocates_nothing() {
        let (root, _) = root();
        let option = WindowOption {
            display_id: 5,
            ..WindowOption::default()
        };
        assert!(matches!(root.create_window("w", option, None), Err(WmError::InvalidParam(_))));
        assert_eq!(root.window_count(), 0);

        let id = root.create_window("w", WindowOption::default(), None).unwrap();
        assert_eq!(id, WindowId(1), "failed create must not burn an id");
    }

    #[test]
    fn client_created_divider_is_not_permitted() {
        let (root, _) = root();
        let option = WindowOption {
            window_type: WindowType::DockSlice,
            ..WindowOption::default()
        };
        assert!(matches!(root.create_window("d", option, None), Err(WmError::NotPermitted(_))));
    }

    #[test]
    fn reaped_window_destroy_and_hide_succeed() {
        let (root, _) = root();
        let id = root.create_window("w", WindowOption::default(), Some(ClientHandle(3))).unwrap();
        root.show_window(id).unwrap();

        assert_eq!(root.handle_client_death(ClientHandle(3)), 1);
        assert!(root.destroy_window(id).is_ok());
        assert!(root.hide_window(id).is_ok());
        assert!(matches!(root.show_window(id), Err(WmError::DeadClient(_))));
        assert!(matches!(root.destroy_window(WindowId(99)), Err(WmError::InvalidParam(_))));
        assert!(root.check_invariants().is_ok());
    }

    #[test]
    fn flushed_minimize_reaches_ability_service() {
        let (root, ability) = root();
        let option = WindowOption {
            ability_token: Some(AbilityToken(11)),
            ..WindowOption::default()
        };
        let id = root.create_window("w", option, None).unwrap();
        root.show_window(id).unwrap();

        assert_eq!(root.minimize_all(0).unwrap(), 1);
        assert_eq!(ability.requests.lock().clone(), vec![(AbilityToken(11), true)]);
        assert!(!root.minimize().is_queued(id));
    }

    #[test]
    fn destroyed_window_leaves_minimize_queue() {
        let (root, ability) = root();
        let option = WindowOption {
            ability_token: Some(AbilityToken(11)),
            ..WindowOption::default()
        };
        let id = root.create_window("w", option, None).unwrap();
        root.show_window(id).unwrap();
        root.minimize().enqueue(id, MinimizeReason::MinimizeButton);

        root.destroy_window(id).unwrap();

        assert!(!root.minimize().is_queued(id));
        assert!(ability.requests.lock().is_empty());
        assert_eq!(root.minimize().flush_all(&root), 0);
    }

    #[test]
    fn starting_window_blocks_minimize() {
        let (root, ability) = root();
        let option = WindowOption {
            ability_token: Some(AbilityToken(11)),
            ..WindowOption::default()
        };
        let id = root.create_window("w", option, None).unwrap();
        root.show_window(id).unwrap();
        root.set_starting_window_shown(id, true).unwrap();

        root.minimize_all(0).unwrap();
        assert!(ability.requests.lock().is_empty());
    }

    /// Agent that queries the root from inside its callback
    struct Reentrant {
        root: Mutex<Option<Arc<WindowRoot>>>,
        seen: Mutex<Vec<Option<WindowId>>>,
    }

    impl WindowManagerAgent for Reentrant {
        fn on_event(&self, event: &AgentEvent) {
            if let AgentEvent::FocusChanged { display_id, .. } = event {
                if let Some(root) = self.root.lock().as_ref() {
                    self.seen.lock().push(root.focused_window(*display_id));
                }
            }
        }
    }

    #[test]
    fn agents_may_call_back_into_root() {
        let (root, _) = root();
        let root = Arc::new(root);
        let agent = Arc::new(Reentrant {
            root: Mutex::new(Some(root.clone())),
            seen: Mutex::new(Vec::new()),
        });
        root.register_agent(agent.clone(), AgentCategory::Focus);

        let id = root.create_window("w", WindowOption::default(), None).unwrap();
        root.show_window(id).unwrap();

        assert_eq!(agent.seen.lock().clone(), vec![Some(id)]);
        // Break the Arc cycle
        agent.root.lock().take();
    }

    /// Agent that pulls focus back to `target` whenever `trigger` gains it
    struct FocusThief {
        root: Mutex<Option<Arc<WindowRoot>>>,
        trigger: WindowId,
        target: WindowId,
    }

    impl WindowManagerAgent for FocusThief {
        fn on_event(&self, event: &AgentEvent) {
            if let AgentEvent::FocusChanged { window_id, focused: true, .. } = event {
                if *window_id == self.trigger {
                    if let Some(root) = self.root.lock().as_ref() {
                        let _ = root.request_focus(self.target);
                    }
                }
            }
        }
    }

    #[derive(Default)]
    struct FocusLog {
        log: Mutex<Vec<(WindowId, bool)>>,
    }

    impl WindowManagerAgent for FocusLog {
        fn on_event(&self, event: &AgentEvent) {
            if let AgentEvent::FocusChanged { window_id, focused, .. } = event {
                self.log.lock().push((*window_id, *focused));
            }
        }
    }

    #[test]
    fn nested_changes_reach_agents_in_commit_order() {
        let (root, _) = root();
        let root = Arc::new(root);
        let a = root.create_window("a", WindowOption::default(), None).unwrap();
        let b = root.create_window("b", WindowOption::default(), None).unwrap();
        root.show_window(a).unwrap();
        root.show_window(b).unwrap();

        let thief = Arc::new(FocusThief {
            root: Mutex::new(Some(root.clone())),
            trigger: a,
            target: b,
        });
        let log = Arc::new(FocusLog::default());
        root.register_agent(thief.clone(), AgentCategory::Focus);
        root.register_agent(log.clone(), AgentCategory::Focus);

        root.request_focus(a).unwrap();

        assert_eq!(root.focused_window(0), Some(b));
        assert_eq!(
            log.log.lock().clone(),
            vec![(b, false), (a, true), (a, false), (b, true)]
        );
        thief.root.lock().take();
    }

    /// Ability service that asks for a second minimize from inside the first
    struct Cascading {
        root: Mutex<Option<Arc<WindowRoot>>>,
        requests: Mutex<Vec<AbilityToken>>,
    }

    impl AbilityManager for Cascading {
        fn minimize_ability(&self, token: AbilityToken, _from_user: bool) -> Result<(), AbilityError> {
            let first = {
                let mut requests = self.requests.lock();
                requests.push(token);
                requests.len() == 1
            };
            if first {
                if let Some(root) = self.root.lock().as_ref() {
                    let _ = root.minimize_all(0);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn minimize_queued_during_flush_is_issued_before_returning() {
        let displays = Arc::new(StaticDisplays::new([DisplayInfo {
            id: 0,
            rect: Rect::new(0, 0, 1280, 720),
        }]));
        let ability = Arc::new(Cascading {
            root: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        });
        let root = Arc::new(WindowRoot::new(WmConfig::default(), displays, ability.clone()));
        *ability.root.lock() = Some(root.clone());

        let option = WindowOption {
            ability_token: Some(AbilityToken(11)),
            ..WindowOption::default()
        };
        let id = root.create_window("w", option, None).unwrap();
        root.show_window(id).unwrap();

        root.minimize_all(0).unwrap();

        assert_eq!(ability.requests.lock().clone(), vec![AbilityToken(11), AbilityToken(11)]);
        assert!(!root.minimize().is_queued(id));
        ability.root.lock().take();
    }

    #[test]
    fn display_removal_drops_every_window() {
        let displays = Arc::new(StaticDisplays::new([
            DisplayInfo { id: 0, rect: Rect::new(0, 0, 1280, 720) },
            DisplayInfo { id: 1, rect: Rect::new(1280, 0, 800, 600) },
        ]));
        let root = WindowRoot::new(WmConfig::default(), displays, Arc::new(Ability::default()));
        let keep = root.create_window("a", WindowOption::default(), None).unwrap();
        let option = WindowOption {
            display_id: 1,
            ..WindowOption::default()
        };
        let gone = root.create_window("b", option, Some(ClientHandle(2))).unwrap();

        assert_eq!(root.notify_display_removed(1), 1);
        assert!(root.window(gone).is_none());
        assert!(root.window(keep).is_some());
        assert_eq!(root.handle_client_death(ClientHandle(2)), 0);
        assert!(root.check_invariants().is_ok());
    }
}
