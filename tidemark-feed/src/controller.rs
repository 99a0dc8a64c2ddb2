use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use tidemark_bus::{EventBus, Subscription};
use tidemark_core::{ChangeEvent, EventFilter, EventQuery, EventStore, FeedConfig};

use crate::error::FeedError;
use crate::view::FeedView;

struct FeedInner {
    config: FeedConfig,
    filter: EventFilter,
    store: Arc<dyn EventStore>,
    view: watch::Sender<Arc<FeedView>>,
}

impl FeedInner {
    fn is_paused(&self) -> bool {
        self.view.borrow().paused
    }

    fn push(&self, event: &ChangeEvent) {
        if !self.filter.matches(event) {
            return;
        }
        let max = self.config.max_events;
        self.view.send_if_modified(|view| {
            if view.paused {
                Arc::make_mut(view).new_event_count += 1;
                return true;
            }
            if view.events.iter().any(|e| e.id == event.id) {
                return false;
            }
            let next = Arc::make_mut(view);
            next.events.insert(0, Arc::new(event.clone()));
            next.events.truncate(max);
            true
        });
    }

    async fn fetch(&self) -> Result<usize, FeedError> {
        self.view.send_modify(|view| Arc::make_mut(view).loading = true);

        let query = EventQuery {
            filter: self.filter.clone(),
            limit: Some(self.config.max_events),
            offset: 0,
        };
        let result = self.store.query_events(&query).await;

        match result {
            Ok(rows) => {
                let events: Vec<Arc<ChangeEvent>> = rows
                    .into_iter()
                    .filter(|e| self.filter.matches(e))
                    .take(self.config.max_events)
                    .map(Arc::new)
                    .collect();
                let count = events.len();
                self.view.send_modify(|view| {
                    let next = Arc::make_mut(view);
                    next.events = events;
                    next.loading = false;
                    next.error = None;
                    next.last_refreshed = Some(Utc::now());
                });
                tracing::debug!(
                    org = %self.config.organization_id,
                    events = count,
                    "feed refreshed",
                );
                Ok(count)
            }
            Err(err) => {
                tracing::warn!(
                    org = %self.config.organization_id,
                    error = %err,
                    "feed refresh failed; keeping previous events",
                );
                let message = err.to_string();
                self.view.send_modify(|view| {
                    let next = Arc::make_mut(view);
                    next.loading = false;
                    next.error = Some(message);
                });
                Err(err.into())
            }
        }
    }
}

struct Running {
    shutdown: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
    subscription: Option<Subscription>,
}

/// Per-observer live view over change events.
///
/// Merges periodic snapshot queries against an [`EventStore`] with realtime
/// pushes from an [`EventBus`]. Both producers go through the same
/// [`EventFilter`] built from the [`FeedConfig`]. Observers read the current
/// [`FeedView`] or await changes through [`FeedController::subscribe`].
pub struct FeedController {
    inner: Arc<FeedInner>,
    bus: Option<Arc<EventBus>>,
    running: Mutex<Option<Running>>,
}

impl FeedController {
    pub fn new(config: FeedConfig, store: Arc<dyn EventStore>) -> Self {
        let filter = config.filter();
        let (view, _) = watch::channel(Arc::new(FeedView::default()));
        Self {
            inner: Arc::new(FeedInner {
                config,
                filter,
                store,
                view,
            }),
            bus: None,
            running: Mutex::new(None),
        }
    }

    /// Attach the bus used for realtime pushes when `config.realtime` is set.
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn config(&self) -> &FeedConfig {
        &self.inner.config
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Subscribe to the bus and spawn the auto-refresh task. Idempotent.
    ///
    /// The refresh task's first tick fires immediately, so a started feed
    /// loads its initial snapshot without an explicit [`refresh`](Self::refresh).
    pub fn start(&self) -> Result<(), FeedError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }

        let config = &self.inner.config;
        let (shutdown, _) = broadcast::channel::<()>(1);

        let task = if config.auto_refresh {
            let handle = tokio::runtime::Handle::try_current().map_err(|_| FeedError::NoRuntime)?;
            let inner = self.inner.clone();
            let shutdown_rx = shutdown.subscribe();
            Some(handle.spawn(refresh_task(inner, shutdown_rx)))
        } else {
            None
        };

        let subscription = match (&self.bus, config.realtime) {
            (Some(bus), true) => {
                let weak: Weak<FeedInner> = Arc::downgrade(&self.inner);
                Some(bus.subscribe_all(move |event| {
                    if let Some(inner) = weak.upgrade() {
                        inner.push(event);
                    }
                }))
            }
            _ => None,
        };

        tracing::info!(
            org = %config.organization_id,
            auto_refresh = config.auto_refresh,
            realtime = subscription.is_some(),
            "feed started",
        );
        *running = Some(Running {
            shutdown,
            task,
            subscription,
        });
        Ok(())
    }

    /// Unsubscribe from the bus and stop the refresh task. Idempotent.
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        if let Some(subscription) = &running.subscription {
            subscription.unsubscribe();
        }
        let _ = running.shutdown.send(());
        // Detached; the task exits on the shutdown signal.
        drop(running.task);
        tracing::info!(org = %self.inner.config.organization_id, "feed stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    // -----------------------------------------------------------------------
    // Backpressure
    // -----------------------------------------------------------------------

    /// Stop applying pushes; count them instead.
    pub fn pause(&self) {
        self.inner.view.send_if_modified(|view| {
            if view.paused {
                return false;
            }
            Arc::make_mut(view).paused = true;
            true
        });
    }

    /// Resume, reset the pending count, and fetch a fresh snapshot.
    ///
    /// Pushes counted while paused are not replayed; the snapshot covers them.
    pub async fn resume(&self) -> Result<usize, FeedError> {
        self.inner.view.send_modify(|view| {
            let next = Arc::make_mut(view);
            next.paused = false;
            next.new_event_count = 0;
        });
        self.inner.fetch().await
    }

    pub fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }

    // -----------------------------------------------------------------------
    // Data
    // -----------------------------------------------------------------------

    /// Fetch a snapshot now, regardless of pause state.
    pub async fn refresh(&self) -> Result<usize, FeedError> {
        self.inner.fetch().await
    }

    /// Apply one event as if it arrived from the bus.
    pub fn push(&self, event: &ChangeEvent) {
        self.inner.push(event);
    }

    /// Empty the list and reset the pending count.
    pub fn clear(&self) {
        self.inner.view.send_modify(|view| {
            let next = Arc::make_mut(view);
            next.events.clear();
            next.new_event_count = 0;
        });
    }

    /// Current view.
    pub fn view(&self) -> Arc<FeedView> {
        self.inner.view.borrow().clone()
    }

    /// Receiver notified after every view swap.
    pub fn subscribe(&self) -> watch::Receiver<Arc<FeedView>> {
        self.inner.view.subscribe()
    }
}

impl Drop for FeedController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FeedController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedController")
            .field("config", &self.inner.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

async fn refresh_task(inner: Arc<FeedInner>, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(inner.config.refresh_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                if inner.is_paused() {
                    tracing::trace!(org = %inner.config.organization_id, "feed paused; skipping refresh tick");
                    continue;
                }
                // Failures are already recorded on the view.
                let _ = inner.fetch().await;
            }
        }
    }
    tracing::debug!(org = %inner.config.organization_id, "feed refresh task exited");
}
