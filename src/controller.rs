use crate::{
    analytics_source::AnalyticsSource,
    fallback,
    log_util::log_debug,
    snapshot::{AnalyticsSnapshot, DashboardState},
};
use chrono::Local;
use color_eyre::eyre::{Result, eyre};
use futures::FutureExt;
use std::{
    any::Any,
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{
    runtime::Handle,
    sync::watch,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(300_000);
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

struct Shared {
    source: Arc<dyn AnalyticsSource>,
    state: watch::Sender<DashboardState>,
    mounted: AtomicBool,
    timer_attached: AtomicBool,
    refreshes_in_flight: AtomicUsize,
}

/// Owns the dashboard's fetch lifecycle and the state the presentation layer reads.
///
/// Handles are cheap to clone; every clone drives the same state. Timer-driven
/// and user-driven fetches are not serialized against each other, so whichever
/// resolves last wins.
#[derive(Clone)]
pub struct AnalyticsDataController {
    shared: Arc<Shared>,
}

impl fmt::Debug for AnalyticsDataController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsDataController")
            .field("mounted", &self.is_mounted())
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

impl AnalyticsDataController {
    pub fn new(source: Arc<dyn AnalyticsSource>) -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        Self {
            shared: Arc::new(Shared {
                source,
                state,
                mounted: AtomicBool::new(true),
                timer_attached: AtomicBool::new(false),
                refreshes_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Start the initial fetch and the periodic refresh timer on the current
    /// tokio runtime. Both stop when the returned [`DashboardMount`] is dropped.
    ///
    /// A controller mounts at most once; after unmount it stays detached.
    pub fn mount(&self, refresh_interval: Duration) -> Result<DashboardMount> {
        if refresh_interval.is_zero() {
            return Err(eyre!("refresh interval must be greater than zero"));
        }
        if refresh_interval > MAX_REFRESH_INTERVAL {
            return Err(eyre!(
                "refresh interval of {}s exceeds the {}s maximum",
                refresh_interval.as_secs(),
                MAX_REFRESH_INTERVAL.as_secs()
            ));
        }
        let handle = Handle::try_current()
            .map_err(|err| eyre!("analytics dashboard needs a tokio runtime: {}", err))?;
        let first_tick = Instant::now()
            .checked_add(refresh_interval)
            .ok_or_else(|| eyre!("refresh interval overflows the runtime clock"))?;

        if !self.is_mounted() {
            return Err(eyre!("analytics controller was already unmounted"));
        }
        if self.shared.timer_attached.swap(true, Ordering::AcqRel) {
            return Err(eyre!("analytics controller is already mounted"));
        }

        let mut mount = DashboardMount {
            controller: self.clone(),
            timer: None,
        };

        let initial = self.clone();
        handle.spawn(async move { initial.fetch_snapshot().await });

        let scheduled = self.clone();
        mount.timer = Some(handle.spawn(async move {
            let mut ticker = time::interval_at(first_tick, refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !scheduled.is_mounted() {
                    break;
                }
                log_debug("AnalyticsController: scheduled refresh fired");
                let fetcher = scheduled.clone();
                tokio::spawn(async move { fetcher.fetch_snapshot().await });
            }
        }));

        log_debug(&format!(
            "AnalyticsController: mounted with refresh interval {}s",
            refresh_interval.as_secs()
        ));
        Ok(mount)
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.mounted.load(Ordering::Acquire)
    }

    /// Clone of the current view state.
    pub fn state(&self) -> DashboardState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.shared.state.subscribe()
    }

    /// Fetch from the data source and commit either its payload or the fallback
    /// snapshot. Never fails; data source errors end up in `error`.
    pub async fn fetch_snapshot(&self) {
        if !self.is_mounted() {
            log_debug("AnalyticsController: skipped fetch after unmount");
            return;
        }

        self.commit(|state| {
            let raise = state.data.is_none() && !state.loading;
            if raise {
                state.loading = true;
            }
            raise
        });
        log_debug("AnalyticsController: fetching analytics snapshot");

        let outcome = AssertUnwindSafe(self.shared.source.fetch_all_analytics())
            .catch_unwind()
            .await;
        let resolved: std::result::Result<AnalyticsSnapshot, String> = match outcome {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(err)) => Err(format!("{:#}", err)),
            Err(payload) => Err(panic_message(payload.as_ref())),
        };

        let summary = match &resolved {
            Ok(_) => "live analytics snapshot applied".to_string(),
            Err(message) => format!("data source failed ({}); fallback snapshot applied", message),
        };
        let now = Local::now();
        let committed = self.commit(move |state| {
            match resolved {
                Ok(snapshot) => {
                    state.data = Some(Arc::new(snapshot));
                    state.error = None;
                }
                Err(message) => {
                    state.data = Some(Arc::new(fallback::fallback_snapshot()));
                    state.error = Some(message);
                }
            }
            state.last_updated = Some(now);
            state.loading = false;
            true
        });

        if committed {
            log_debug(&format!("AnalyticsController: {}", summary));
        } else {
            log_debug("AnalyticsController: discarded fetch resolution after unmount");
        }
    }

    /// User-triggered refetch. `refreshing` stays true while any refresh is in flight.
    pub async fn refresh(&self) {
        let _bracket = RefreshBracket::enter(self);
        log_debug("AnalyticsController: manual refresh requested");
        self.fetch_snapshot().await;
    }

    /// Applies `mutate` unless unmounted. Subscribers are notified only when
    /// `mutate` reports a change.
    fn commit<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut DashboardState) -> bool,
    {
        let mounted = &self.shared.mounted;
        self.shared.state.send_if_modified(|state| {
            if !mounted.load(Ordering::Acquire) {
                return false;
            }
            mutate(state)
        })
    }

    fn adjust_refreshes(&self, entering: bool) {
        let shared = &self.shared;
        shared.state.send_if_modified(|state| {
            let in_flight = if entering {
                shared.refreshes_in_flight.fetch_add(1, Ordering::AcqRel) + 1
            } else {
                shared
                    .refreshes_in_flight
                    .fetch_sub(1, Ordering::AcqRel)
                    .saturating_sub(1)
            };
            if !shared.mounted.load(Ordering::Acquire) {
                return false;
            }
            let refreshing = in_flight > 0;
            let changed = state.refreshing != refreshing;
            state.refreshing = refreshing;
            changed
        });
    }

    fn detach(&self) {
        let mounted = &self.shared.mounted;
        // Flipped under the state lock so no commit can slip in afterwards.
        self.shared.state.send_if_modified(|_| {
            mounted.store(false, Ordering::Release);
            false
        });
    }
}

/// Holds `refreshing` up for the lifetime of one `refresh()` call, including
/// when that call is cancelled mid-fetch.
struct RefreshBracket<'a> {
    controller: &'a AnalyticsDataController,
}

impl<'a> RefreshBracket<'a> {
    fn enter(controller: &'a AnalyticsDataController) -> Self {
        controller.adjust_refreshes(true);
        Self { controller }
    }
}

impl Drop for RefreshBracket<'_> {
    fn drop(&mut self) {
        self.controller.adjust_refreshes(false);
    }
}

/// Scope of one mounted dashboard. Dropping it stops the refresh timer and turns
/// any later fetch resolution into a no-op.
#[derive(Debug)]
pub struct DashboardMount {
    controller: AnalyticsDataController,
    timer: Option<JoinHandle<()>>,
}

impl DashboardMount {
    pub fn controller(&self) -> &AnalyticsDataController {
        &self.controller
    }

    pub fn unmount(self) {}
}

impl Drop for DashboardMount {
    fn drop(&mut self) {
        self.controller.detach();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        log_debug("AnalyticsController: unmounted");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown error".to_string()
    }
}
