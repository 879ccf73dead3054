//! Data update coordinator
//!
//! A coordinator is the single puller of a device's state. It fetches on a
//! fixed interval or on request, never runs two fetches at once, and
//! publishes the outcome through a `watch` channel so entities can
//! reconcile from it.
//!
//! ```text
//! scheduler tick ─┐
//! request_refresh ├─> refresh() ──> update_method() ──> watch::Sender<CoordinatorState>
//! first_refresh ──┘     (coalesced)                           │
//!                                                             └─> entity reconciles
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use ha_core::HomeAssistantError;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};

/// Error returned by an update method when the device could not be read
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct UpdateFailed(pub String);

/// Fetches one snapshot of the device state
pub type UpdateMethod<T> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<T, UpdateFailed>> + Send + Sync + 'static>;

/// What subscribers see after each fetch
#[derive(Debug, Clone)]
pub struct CoordinatorState<T> {
    /// Latest successfully fetched data; kept across failed fetches
    pub data: Option<T>,
    /// Whether the most recent fetch succeeded
    pub last_update_success: bool,
    /// Error of the most recent fetch, if it failed
    pub last_error: Option<UpdateFailed>,
}

impl<T> Default for CoordinatorState<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_update_success: true,
            last_error: None,
        }
    }
}

/// Periodically and on demand pulls data through an update method
pub struct DataUpdateCoordinator<T> {
    name: String,
    update_interval: Duration,
    update_method: UpdateMethod<T>,
    state: watch::Sender<CoordinatorState<T>>,
    /// Held for the duration of a fetch
    refresh_lock: Mutex<()>,
    /// Set by every refresh request, cleared by the fetch that serves it
    refresh_pending: AtomicBool,
}

impl<T> DataUpdateCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a coordinator
    pub fn new(
        name: impl Into<String>,
        update_interval: Duration,
        update_method: UpdateMethod<T>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(CoordinatorState::default());
        Arc::new(Self {
            name: name.into(),
            update_interval,
            update_method,
            state,
            refresh_lock: Mutex::new(()),
            refresh_pending: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Latest successfully fetched data
    pub fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }

    /// Whether the most recent fetch succeeded
    pub fn last_update_success(&self) -> bool {
        self.state.borrow().last_update_success
    }

    /// Subscribe to fetch outcomes
    ///
    /// Every fetch notifies, even when the data is unchanged.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState<T>> {
        self.state.subscribe()
    }

    /// First fetch during config entry setup
    ///
    /// A failure means the device is not reachable yet, so setup should be
    /// retried later.
    pub async fn config_entry_first_refresh(&self) -> Result<(), HomeAssistantError> {
        self.refresh().await;

        let state = self.state.borrow();
        match (&state.data, &state.last_error) {
            (Some(_), None) => Ok(()),
            (_, Some(err)) => Err(HomeAssistantError::ConfigEntryNotReady(err.to_string())),
            (None, None) => Err(HomeAssistantError::ConfigEntryNotReady(format!(
                "{} returned no data",
                self.name
            ))),
        }
    }

    /// Fetch now, unless a fetch is already running
    ///
    /// A request arriving while a fetch is in flight is folded into a single
    /// follow-up fetch run by the current holder. Returns whether this call
    /// performed a fetch itself.
    pub async fn refresh(&self) -> bool {
        self.refresh_pending.store(true, Ordering::SeqCst);

        let mut fetched = false;
        while self.refresh_pending.load(Ordering::SeqCst) {
            let Ok(_guard) = self.refresh_lock.try_lock() else {
                trace!(coordinator = %self.name, "Fetch in flight, coalescing refresh");
                break;
            };
            if !self.refresh_pending.swap(false, Ordering::SeqCst) {
                continue;
            }
            self.fetch().await;
            fetched = true;
        }
        fetched
    }

    /// Schedule a refresh without waiting for it
    pub fn request_refresh(self: &Arc<Self>) -> JoinHandle<bool> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.refresh().await })
    }

    /// Schedule a refresh after `delay` without waiting for it
    pub fn request_refresh_after(self: &Arc<Self>, delay: Duration) -> JoinHandle<bool> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            coordinator.refresh().await
        })
    }

    /// Start fetching every `update_interval`
    ///
    /// The task stops by itself once the coordinator is dropped.
    pub fn spawn_scheduler(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::downgrade(self);
        let period = self.update_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                coordinator.refresh().await;
            }
        })
    }

    async fn fetch(&self) {
        debug!(coordinator = %self.name, "Fetching data");
        let was_successful = self.last_update_success();

        match (self.update_method)().await {
            Ok(data) => {
                if !was_successful {
                    info!(coordinator = %self.name, "Fetching data recovered");
                }
                self.state.send_replace(CoordinatorState {
                    data: Some(data),
                    last_update_success: true,
                    last_error: None,
                });
            }
            Err(err) => {
                if was_successful {
                    error!(coordinator = %self.name, "Error fetching data: {}", err);
                } else {
                    debug!(coordinator = %self.name, "Fetching data still failing: {}", err);
                }
                self.state.send_modify(|state| {
                    state.last_update_success = false;
                    state.last_error = Some(err);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;
    use tokio_test::{assert_err, assert_ok};

    /// Update method returning the call count, failing while `fail` is set
    fn counting_method(
        calls: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
        delay: Duration,
    ) -> UpdateMethod<usize> {
        Arc::new(move || {
            let calls = Arc::clone(&calls);
            let fail = Arc::clone(&fail);
            async move {
                tokio::time::sleep(delay).await;
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if fail.load(Ordering::SeqCst) {
                    Err(UpdateFailed("device unreachable".to_string()))
                } else {
                    Ok(n)
                }
            }
            .boxed()
        })
    }

    fn make_coordinator(
        delay: Duration,
    ) -> (
        Arc<DataUpdateCoordinator<usize>>,
        Arc<AtomicUsize>,
        Arc<AtomicBool>,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fail = Arc::new(AtomicBool::new(false));
        let coordinator = DataUpdateCoordinator::new(
            "test",
            Duration::from_secs(300),
            counting_method(Arc::clone(&calls), Arc::clone(&fail), delay),
        );
        (coordinator, calls, fail)
    }

    #[tokio::test]
    async fn test_first_refresh_success() {
        let (coordinator, calls, _) = make_coordinator(Duration::ZERO);

        assert_ok!(coordinator.config_entry_first_refresh().await);

        assert_eq!(coordinator.data(), Some(1));
        assert!(coordinator.last_update_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_refresh_failure_is_not_ready() {
        let (coordinator, _, fail) = make_coordinator(Duration::ZERO);
        fail.store(true, Ordering::SeqCst);

        let err = assert_err!(coordinator.config_entry_first_refresh().await);

        assert!(err.is_retryable());
        assert!(err.to_string().contains("device unreachable"));
    }

    #[tokio::test]
    async fn test_failure_marks_unsuccessful_and_keeps_data() {
        let (coordinator, _, fail) = make_coordinator(Duration::ZERO);
        let mut rx = coordinator.subscribe();
        coordinator.refresh().await;
        assert!(assert_ok!(rx.has_changed()));
        rx.borrow_and_update();

        fail.store(true, Ordering::SeqCst);
        coordinator.refresh().await;

        assert!(assert_ok!(rx.has_changed()));
        let state = rx.borrow_and_update().clone();
        assert!(!state.last_update_success);
        assert_eq!(state.data, Some(1));
        assert_eq!(
            state.last_error,
            Some(UpdateFailed("device unreachable".to_string()))
        );

        fail.store(false, Ordering::SeqCst);
        coordinator.refresh().await;
        assert!(coordinator.last_update_success());
        assert_eq!(coordinator.data(), Some(3));
    }

    #[tokio::test]
    async fn test_unchanged_data_still_notifies() {
        let coordinator = DataUpdateCoordinator::new(
            "constant",
            Duration::from_secs(300),
            Arc::new(|| async { Ok::<_, UpdateFailed>(7u8) }.boxed()),
        );
        let mut rx = coordinator.subscribe();

        coordinator.refresh().await;
        rx.borrow_and_update();
        coordinator.refresh().await;

        assert!(assert_ok!(rx.has_changed()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_are_coalesced() {
        let (coordinator, calls, _) = make_coordinator(Duration::from_millis(50));

        let results = tokio::join!(
            coordinator.refresh(),
            coordinator.refresh(),
            coordinator.refresh(),
            coordinator.refresh(),
        );

        assert_eq!(results, (true, false, false, false));
        // One fetch plus a single follow-up for everything that arrived meanwhile
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_fetches_every_interval() {
        let (coordinator, calls, _) = make_coordinator(Duration::ZERO);
        let handle = coordinator.spawn_scheduler();

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(302)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_refresh_after_delay() {
        let (coordinator, calls, _) = make_coordinator(Duration::ZERO);

        let handle = coordinator.request_refresh_after(Duration::from_millis(500));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(assert_ok!(handle.await));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
