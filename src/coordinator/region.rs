//! Coordination of sibling machines: fork, broadcast, synchronization
//! waits, and join.
//!
//! A [`RegionCoordinator`] runs independent machines side by side, each
//! under a string identifier. It layers cross-machine concerns on top of
//! the per-machine engine: targeted and broadcast delivery, edge-triggered
//! synchronization conditions over the combined configuration, and joins
//! that dispose a group of regions once they reach agreed states.
//!
//! All waits are passive and clock-driven; the coordinator never blocks a
//! thread. Condition evaluation happens on every region state change, and
//! user callbacks always run with the coordinator's lock released.

use crate::clock::{lock, Clock, TimerToken};
use crate::coordinator::error::CoordinatorError;
use crate::coordinator::sync::{SyncHandle, SyncStatus};
use crate::core::{EventId, StateId, TransitionRecord};
use crate::machine::{Machine, MachineOptions, Notification, Subscription};
use crate::table::TransitionTable;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Everything needed to start one region under a coordinator.
pub struct RegionSpec<S: StateId, C, E: EventId> {
    pub id: String,
    pub table: Arc<TransitionTable<S, C, E>>,
    pub context: C,
    pub options: MachineOptions,
}

impl<S: StateId, C, E: EventId> RegionSpec<S, C, E> {
    pub fn new(id: impl Into<String>, table: Arc<TransitionTable<S, C, E>>, context: C) -> Self {
        Self {
            id: id.into(),
            table,
            context,
            options: MachineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MachineOptions) -> Self {
        self.options = options;
        self
    }
}

struct Region<S: StateId, C, E: EventId> {
    id: String,
    machine: Machine<S, C, E>,
    active: bool,
    subscription: Option<Subscription>,
}

struct Waiter<S: StateId> {
    id: u64,
    conditions: Vec<(String, S)>,
    handle: SyncHandle,
    /// Regions to dispose when the conditions hold (join semantics).
    join_ids: Vec<String>,
    timer: Option<TimerToken>,
}

type WatchFn = Arc<dyn Fn() + Send + Sync>;

struct Watcher<S: StateId> {
    name: String,
    conditions: Vec<(String, S)>,
    /// Whether the conditions held at the previous evaluation; only a
    /// false-to-true edge fires the callback.
    last: bool,
    callback: WatchFn,
}

type ListenerFn<S, E> = Arc<dyn Fn(&str, &TransitionRecord<S, E>) + Send + Sync>;

struct CoordInner<S: StateId, C, E: EventId> {
    regions: Vec<Region<S, C, E>>,
    waiters: Vec<Waiter<S>>,
    watchers: Vec<Watcher<S>>,
    listeners: Vec<(u64, ListenerFn<S, E>)>,
    next_id: u64,
}

struct CoordShared<S: StateId, C, E: EventId> {
    inner: Mutex<CoordInner<S, C, E>>,
    clock: Arc<dyn Clock>,
    strict_regions: bool,
}

fn conditions_hold<S, C, E, I>(regions: &[Region<S, C, E>], conditions: &[(I, S)]) -> bool
where
    S: StateId,
    C: Clone + Send + 'static,
    E: EventId,
    I: AsRef<str>,
{
    conditions.iter().all(|(id, state)| {
        regions
            .iter()
            .any(|r| r.active && r.id == id.as_ref() && r.machine.is_in(*state))
    })
}

/// Runs independent machines side by side and synchronizes across them.
///
/// Handles are cheap to clone and share one coordinator.
pub struct RegionCoordinator<S: StateId, C, E: EventId> {
    shared: Arc<CoordShared<S, C, E>>,
}

impl<S: StateId, C, E: EventId> Clone for RegionCoordinator<S, C, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, C, E> RegionCoordinator<S, C, E>
where
    S: StateId,
    C: Clone + Send + 'static,
    E: EventId,
{
    /// Create a coordinator. Events sent to unknown regions are dropped
    /// silently; use [`RegionCoordinator::strict`] to make them errors.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::build(clock, false)
    }

    /// Create a coordinator that rejects events for unknown regions with
    /// [`CoordinatorError::UnknownRegion`].
    pub fn strict(clock: Arc<dyn Clock>) -> Self {
        Self::build(clock, true)
    }

    fn build(clock: Arc<dyn Clock>, strict_regions: bool) -> Self {
        Self {
            shared: Arc::new(CoordShared {
                inner: Mutex::new(CoordInner {
                    regions: Vec::new(),
                    waiters: Vec::new(),
                    watchers: Vec::new(),
                    listeners: Vec::new(),
                    next_id: 0,
                }),
                clock,
                strict_regions,
            }),
        }
    }

    /// Start a batch of regions.
    ///
    /// Region identifiers must be unique among active regions; an
    /// identifier freed by a join or deactivation may be reused. Each
    /// machine enters its initial configuration (running entry hooks and
    /// settling transients) as it is constructed.
    pub fn fork(&self, specs: Vec<RegionSpec<S, C, E>>) -> Result<(), CoordinatorError> {
        {
            let inner = lock(&self.shared.inner);
            let mut batch: Vec<&str> = Vec::new();
            for spec in &specs {
                let taken = inner.regions.iter().any(|r| r.active && r.id == spec.id)
                    || batch.contains(&spec.id.as_str());
                if taken {
                    return Err(CoordinatorError::DuplicateRegion(spec.id.clone()));
                }
                batch.push(&spec.id);
            }
        }

        for spec in specs {
            let machine = Machine::new(
                spec.table,
                spec.context,
                Arc::clone(&self.shared.clock),
                spec.options,
            )?;
            let weak = Arc::downgrade(&self.shared);
            let region_id = spec.id.clone();
            let subscription = machine.subscribe(move |notification| {
                if let Notification::StateChanged(record) = notification {
                    if let Some(shared) = weak.upgrade() {
                        Self::handle_state_change(&shared, &region_id, record);
                    }
                }
            });
            lock(&self.shared.inner).regions.push(Region {
                id: spec.id,
                machine,
                active: true,
                subscription: Some(subscription),
            });
            // Initial configurations may already satisfy pending waits.
            Self::evaluate_sync(&self.shared);
        }
        Ok(())
    }

    /// Send an event to one region.
    ///
    /// Delivery to a disposed region is always an error. An unknown
    /// identifier is a silent no-op, or
    /// [`CoordinatorError::UnknownRegion`] under [`RegionCoordinator::strict`].
    pub fn send_to_region(&self, id: &str, event: E) -> Result<(), CoordinatorError> {
        let machine = {
            let inner = lock(&self.shared.inner);
            if let Some(region) = inner.regions.iter().rev().find(|r| r.active && r.id == id) {
                Some(region.machine.clone())
            } else if inner.regions.iter().any(|r| r.id == id) {
                return Err(CoordinatorError::RegionDisposed(id.to_string()));
            } else if self.shared.strict_regions {
                return Err(CoordinatorError::UnknownRegion(id.to_string()));
            } else {
                None
            }
        };
        if let Some(machine) = machine {
            machine.send(event)?;
        }
        Ok(())
    }

    /// Send an event to an explicit subset of regions, in the given
    /// order. Per-region semantics match
    /// [`RegionCoordinator::send_to_region`]; the first error is
    /// returned after every region has been attempted.
    pub fn send_to_regions(&self, ids: &[&str], event: E) -> Result<(), CoordinatorError> {
        let mut first_error = None;
        for id in ids {
            if let Err(error) = self.send_to_region(id, event) {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Send an event to every active region, in fork order.
    ///
    /// Every region is attempted even if one fails; the first error is
    /// returned.
    pub fn broadcast(&self, event: E) -> Result<(), CoordinatorError> {
        let machines: Vec<Machine<S, C, E>> = lock(&self.shared.inner)
            .regions
            .iter()
            .filter(|r| r.active)
            .map(|r| r.machine.clone())
            .collect();

        let mut first_error = None;
        for machine in machines {
            if let Err(error) = machine.send(event) {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    /// Broadcast an event, then wait for the named regions to reach the
    /// given states.
    pub fn synced_broadcast(
        &self,
        event: E,
        conditions: &[(&str, S)],
        timeout: Option<Duration>,
    ) -> Result<SyncHandle, CoordinatorError> {
        self.broadcast(event)?;
        Ok(self.wait_for_sync(conditions, timeout))
    }

    /// Wait for every named region to be in (or inside) the given state.
    ///
    /// Resolves immediately if the conditions already hold. A condition
    /// naming an unknown or disposed region stays unmet until the
    /// timeout; without a timeout the wait stays pending indefinitely.
    /// The returned handle never blocks; observe it with
    /// [`SyncHandle::status`] or [`SyncHandle::on_settle`].
    pub fn wait_for_sync(&self, conditions: &[(&str, S)], timeout: Option<Duration>) -> SyncHandle {
        self.register_wait(conditions, timeout, Vec::new())
    }

    /// Wait for the named regions to reach the given states, then dispose
    /// the regions in `ids`.
    pub fn join(
        &self,
        ids: &[&str],
        conditions: &[(&str, S)],
        timeout: Option<Duration>,
    ) -> SyncHandle {
        self.register_wait(
            conditions,
            timeout,
            ids.iter().map(|id| id.to_string()).collect(),
        )
    }

    fn register_wait(
        &self,
        conditions: &[(&str, S)],
        timeout: Option<Duration>,
        join_ids: Vec<String>,
    ) -> SyncHandle {
        let conditions: Vec<(String, S)> = conditions
            .iter()
            .map(|(id, state)| (id.to_string(), *state))
            .collect();

        let mut inner = lock(&self.shared.inner);
        if conditions_hold(&inner.regions, &conditions) {
            let joined = Self::deactivate_named(&mut inner, &join_ids);
            drop(inner);
            for machine in &joined {
                machine.dispose();
            }
            return SyncHandle::resolved();
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let handle = SyncHandle::pending();
        let timer = timeout.map(|timeout| {
            let weak = Arc::downgrade(&self.shared);
            self.shared.clock.schedule(
                timeout,
                Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        Self::on_wait_timeout(&shared, id);
                    }
                }),
            )
        });
        inner.waiters.push(Waiter {
            id,
            conditions,
            handle: handle.clone(),
            join_ids,
            timer,
        });
        handle
    }

    /// Register a named, repeating synchronization watcher.
    ///
    /// The callback fires each time the conditions go from unmet to met.
    /// It does not fire at registration, even if the conditions already
    /// hold. Registering under an existing name replaces that watcher.
    pub fn on_sync(
        &self,
        name: &str,
        conditions: &[(&str, S)],
        callback: impl Fn() + Send + Sync + 'static,
    ) {
        let conditions: Vec<(String, S)> = conditions
            .iter()
            .map(|(id, state)| (id.to_string(), *state))
            .collect();
        let mut inner = lock(&self.shared.inner);
        let last = conditions_hold(&inner.regions, &conditions);
        inner.watchers.retain(|w| w.name != name);
        inner.watchers.push(Watcher {
            name: name.to_string(),
            conditions,
            last,
            callback: Arc::new(callback),
        });
    }

    /// Remove a named watcher. Unknown names are ignored.
    pub fn remove_sync(&self, name: &str) {
        lock(&self.shared.inner).watchers.retain(|w| w.name != name);
    }

    /// Subscribe to every region's state changes. Returns a listener id
    /// for [`RegionCoordinator::remove_listener`].
    pub fn on_any_state_change(
        &self,
        callback: impl Fn(&str, &TransitionRecord<S, E>) + Send + Sync + 'static,
    ) -> u64 {
        let mut inner = lock(&self.shared.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(callback)));
        id
    }

    /// Remove a listener registered with
    /// [`RegionCoordinator::on_any_state_change`].
    pub fn remove_listener(&self, id: u64) {
        lock(&self.shared.inner)
            .listeners
            .retain(|(listener_id, _)| *listener_id != id);
    }

    /// Dispose one region. Its identifier becomes available for reuse.
    pub fn deactivate_region(&self, id: &str) -> Result<(), CoordinatorError> {
        let machine = {
            let mut inner = lock(&self.shared.inner);
            let joined = Self::deactivate_named(&mut inner, &[id.to_string()]);
            match joined.into_iter().next() {
                Some(machine) => machine,
                None => {
                    return if inner.regions.iter().any(|r| r.id == id) {
                        Err(CoordinatorError::RegionDisposed(id.to_string()))
                    } else {
                        Err(CoordinatorError::UnknownRegion(id.to_string()))
                    };
                }
            }
        };
        machine.dispose();
        Ok(())
    }

    /// Dispose every active region.
    pub fn deactivate_all(&self) {
        let machines = {
            let mut inner = lock(&self.shared.inner);
            let ids: Vec<String> = inner
                .regions
                .iter()
                .filter(|r| r.active)
                .map(|r| r.id.clone())
                .collect();
            Self::deactivate_named(&mut inner, &ids)
        };
        for machine in &machines {
            machine.dispose();
        }
    }

    /// True if every named region is active and in (or inside) the given
    /// state.
    pub fn are_regions_in_states(&self, conditions: &[(&str, S)]) -> bool {
        conditions_hold(&lock(&self.shared.inner).regions, conditions)
    }

    /// The current leaf state of an active region.
    pub fn region_state(&self, id: &str) -> Option<S> {
        lock(&self.shared.inner)
            .regions
            .iter()
            .rev()
            .find(|r| r.active && r.id == id)
            .map(|r| r.machine.current_state())
    }

    /// Identifiers of all active regions, in fork order.
    pub fn active_regions(&self) -> Vec<String> {
        lock(&self.shared.inner)
            .regions
            .iter()
            .filter(|r| r.active)
            .map(|r| r.id.clone())
            .collect()
    }

    /// A handle to an active region's machine, for direct observation.
    pub fn machine(&self, id: &str) -> Option<Machine<S, C, E>> {
        lock(&self.shared.inner)
            .regions
            .iter()
            .rev()
            .find(|r| r.active && r.id == id)
            .map(|r| r.machine.clone())
    }

    /// Mark the named regions inactive and return their machines for
    /// disposal outside the lock.
    fn deactivate_named(
        inner: &mut CoordInner<S, C, E>,
        ids: &[String],
    ) -> Vec<Machine<S, C, E>> {
        let mut machines = Vec::new();
        for id in ids {
            if let Some(region) = inner
                .regions
                .iter_mut()
                .rev()
                .find(|r| r.active && r.id == *id)
            {
                region.active = false;
                if let Some(subscription) = region.subscription.take() {
                    subscription.cancel();
                }
                machines.push(region.machine.clone());
            }
        }
        machines
    }

    fn handle_state_change(
        shared: &Arc<CoordShared<S, C, E>>,
        region_id: &str,
        record: &TransitionRecord<S, E>,
    ) {
        let listeners: Vec<ListenerFn<S, E>> = lock(&shared.inner)
            .listeners
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();
        for listener in &listeners {
            listener(region_id, record);
        }
        Self::evaluate_sync(shared);
    }

    /// Re-evaluate every waiter and watcher against the current region
    /// states. User callbacks run with the lock released.
    fn evaluate_sync(shared: &Arc<CoordShared<S, C, E>>) {
        let (resolved, fired) = {
            let mut inner = lock(&shared.inner);

            let satisfied: Vec<u64> = inner
                .waiters
                .iter()
                .filter(|w| conditions_hold(&inner.regions, &w.conditions))
                .map(|w| w.id)
                .collect();
            let mut resolved = Vec::new();
            for waiter_id in satisfied {
                let Some(position) = inner.waiters.iter().position(|w| w.id == waiter_id) else {
                    continue;
                };
                let waiter = inner.waiters.remove(position);
                if let Some(token) = &waiter.timer {
                    shared.clock.cancel(token);
                }
                let joined = Self::deactivate_named(&mut inner, &waiter.join_ids);
                resolved.push((waiter.handle, joined));
            }

            let mut fired: Vec<WatchFn> = Vec::new();
            for index in 0..inner.watchers.len() {
                let holds = conditions_hold(&inner.regions, &inner.watchers[index].conditions);
                let watcher = &mut inner.watchers[index];
                if holds && !watcher.last {
                    fired.push(Arc::clone(&watcher.callback));
                }
                watcher.last = holds;
            }

            (resolved, fired)
        };

        for (handle, joined) in resolved {
            for machine in &joined {
                machine.dispose();
            }
            handle.settle(SyncStatus::Resolved);
        }
        for callback in fired {
            callback();
        }
    }

    fn on_wait_timeout(shared: &Arc<CoordShared<S, C, E>>, waiter_id: u64) {
        let handle = {
            let mut inner = lock(&shared.inner);
            inner
                .waiters
                .iter()
                .position(|w| w.id == waiter_id)
                .map(|position| inner.waiters.remove(position).handle)
        };
        if let Some(handle) = handle {
            handle.settle(SyncStatus::TimedOut);
        }
    }
}
