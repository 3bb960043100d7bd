//! Activity-gated position polling
//!
//! Polling runs only while the tracked screen is visible and the app is in
//! the foreground. Each running period owns one [`CancellationToken`] and one
//! timer task, created and torn down together.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::positions::{PositionRecord, PositionSource};

/// Capacity of the notification channel; slow receivers skip old snapshots
const EVENT_CAPACITY: usize = 16;

/// Published after every successful fetch cycle
#[derive(Debug, Clone)]
pub struct PositionsRefreshed {
    /// The positions returned by the cycle
    pub positions: Arc<Vec<PositionRecord>>,

    /// When the cycle completed
    pub refreshed_at: DateTime<Utc>,
}

type Callback = Arc<dyn Fn(&PositionsRefreshed) + Send + Sync>;

/// Timer task and the cancellation token bound to it
struct PollingHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollingHandle {
    fn start(inner: Arc<Inner>) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Inner::run(inner, cancel.clone()));
        Self { cancel, task }
    }

    fn stop(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

struct SchedulerState {
    screen_active: bool,
    app_active: bool,
    polling: Option<PollingHandle>,
    generation: u64,
}

struct Inner {
    source: Arc<dyn PositionSource>,
    poll_interval: Duration,
    ticks_per_refresh: u32,
    state: Mutex<SchedulerState>,
    ticks: AtomicU32,
    snapshot: RwLock<Arc<Vec<PositionRecord>>>,
    events: broadcast::Sender<PositionsRefreshed>,
    callbacks: Mutex<HashMap<u64, Callback>>,
    next_callback_id: AtomicU64,
    fetch_lock: tokio::sync::Mutex<()>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start or stop polling so that it runs iff both flags are set
    fn apply(inner: &Arc<Inner>, state: &mut SchedulerState) {
        let should_run = state.screen_active && state.app_active;
        match (should_run, state.polling.is_some()) {
            (true, false) => {
                state.generation += 1;
                info!("Starting position polling (run {})", state.generation);
                state.polling = Some(PollingHandle::start(inner.clone()));
            }
            (false, true) => {
                if let Some(polling) = state.polling.take() {
                    info!("Stopping position polling (run {})", state.generation);
                    polling.stop();
                }
            }
            _ => {}
        }
    }

    async fn run(inner: Arc<Inner>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(inner.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    inner.on_tick(&cancel).await;
                }
            }
        }
        debug!("Polling loop finished");
    }

    /// Count one tick and run a cycle on every `ticks_per_refresh`-th
    async fn on_tick(&self, cancel: &CancellationToken) -> bool {
        let ticks = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        if ticks < self.ticks_per_refresh {
            return false;
        }
        self.ticks.store(0, Ordering::SeqCst);

        let Ok(_guard) = self.fetch_lock.try_lock() else {
            debug!("Fetch already in flight, skipping scheduled cycle");
            return false;
        };
        self.fetch_and_publish(cancel).await
    }

    /// Run one cycle after any in-flight cycle has finished
    async fn forced_cycle(&self, cancel: &CancellationToken) -> bool {
        let _guard = self.fetch_lock.lock().await;
        self.fetch_and_publish(cancel).await
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<Vec<PositionRecord>, Error> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.source.fetch_positions(cancel) => result,
        }
    }

    /// Fetch, replace the snapshot and notify; failures only get logged
    async fn fetch_and_publish(&self, cancel: &CancellationToken) -> bool {
        match self.fetch(cancel).await {
            Ok(positions) => {
                if cancel.is_cancelled() {
                    debug!("Polling stopped during fetch, discarding result");
                    return false;
                }
                let event = PositionsRefreshed {
                    positions: Arc::new(positions),
                    refreshed_at: Utc::now(),
                };
                self.replace_snapshot(event.positions.clone());
                self.publish(&event);
                true
            }
            Err(err) if err.is_cancelled() => {
                debug!("Position fetch cancelled");
                false
            }
            Err(err) => {
                warn!("Position refresh failed: {}", err);
                false
            }
        }
    }

    fn replace_snapshot(&self, positions: Arc<Vec<PositionRecord>>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = positions;
    }

    fn publish(&self, event: &PositionsRefreshed) {
        debug!("Publishing {} positions", event.positions.len());
        // No receivers is not an error
        let _ = self.events.send(event.clone());

        let callbacks: Vec<Callback> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }
}

/// Periodic, activity-gated position refresher
///
/// Setters must be called from within a Tokio runtime since starting a
/// polling period spawns its timer task.
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    /// Create a stopped scheduler; the app is assumed to be in the foreground
    pub fn new(source: Arc<dyn PositionSource>, options: &ClientOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                source,
                poll_interval: options.poll_interval,
                ticks_per_refresh: options.ticks_per_refresh.max(1),
                state: Mutex::new(SchedulerState {
                    screen_active: false,
                    app_active: true,
                    polling: None,
                    generation: 0,
                }),
                ticks: AtomicU32::new(0),
                snapshot: RwLock::new(Arc::new(Vec::new())),
                events,
                callbacks: Mutex::new(HashMap::new()),
                next_callback_id: AtomicU64::new(1),
                fetch_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Mark the tracked screen visible or hidden
    pub fn set_screen_active(&self, active: bool) {
        let mut state = self.inner.lock_state();
        state.screen_active = active;
        Inner::apply(&self.inner, &mut state);
    }

    /// Mark the app foregrounded or backgrounded
    ///
    /// With `force_immediate_fetch` a cycle runs right away, whether or not
    /// polling is running.
    pub async fn set_app_active(&self, active: bool, force_immediate_fetch: bool) {
        let cancel = {
            let mut state = self.inner.lock_state();
            state.app_active = active;
            Inner::apply(&self.inner, &mut state);
            state.polling.as_ref().map(|polling| polling.cancel.clone())
        };

        if force_immediate_fetch {
            self.inner.forced_cycle(&cancel.unwrap_or_default()).await;
        }
    }

    /// Mark the screen active for as long as the returned guard lives
    pub fn screen_guard(&self) -> ScreenGuard<'_> {
        self.set_screen_active(true);
        ScreenGuard { scheduler: self }
    }

    /// Whether a polling period is running
    pub fn is_running(&self) -> bool {
        self.inner.lock_state().polling.is_some()
    }

    /// Number of polling periods started so far
    pub fn polling_generation(&self) -> u64 {
        self.inner.lock_state().generation
    }

    /// The positions of the last successful cycle
    pub fn snapshot(&self) -> Arc<Vec<PositionRecord>> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetch now and replace the snapshot without notifying subscribers
    ///
    /// Unlike scheduled cycles, failures are returned to the caller.
    pub async fn refresh_now(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<Vec<PositionRecord>>, Error> {
        let _guard = self.inner.fetch_lock.lock().await;
        let positions = Arc::new(self.inner.fetch(cancel).await?);
        self.inner.replace_snapshot(positions.clone());
        Ok(positions)
    }

    /// Receive every refresh notification published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PositionsRefreshed> {
        self.inner.events.subscribe()
    }

    /// Call `callback` after every successful cycle until the returned
    /// subscription is dropped
    pub fn on_refreshed<F>(&self, callback: F) -> RefreshSubscription
    where
        F: Fn(&PositionsRefreshed) + Send + Sync + 'static,
    {
        let id = self.inner.next_callback_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(callback));
        RefreshSubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Stop polling; safe to call any number of times
    pub fn dispose(&self) {
        let mut state = self.inner.lock_state();
        if let Some(polling) = state.polling.take() {
            info!("Disposing position polling (run {})", state.generation);
            polling.stop();
        }
    }

    #[cfg(test)]
    async fn tick(&self, cancel: &CancellationToken) -> bool {
        self.inner.on_tick(cancel).await
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Registered refresh callback, removed on drop
pub struct RefreshSubscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Drop for RefreshSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}

/// Keeps the tracked screen marked active
pub struct ScreenGuard<'a> {
    scheduler: &'a RefreshScheduler,
}

impl ScreenGuard<'_> {
    /// Navigate away from the screen
    pub fn leave(self) {}
}

impl Drop for ScreenGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.set_screen_active(false);
    }
}
