use crate::client::HttpClient;
use crate::stats::StatsAggregator;
use governor::DefaultDirectRateLimiter;
use rampage_core::{Check, CheckResult, Request};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// What a single iteration does; shared by every virtual user of a run.
pub(crate) struct Iteration {
    pub request: Request,
    pub checks: Vec<Check>,
    pub sleep: Option<Duration>,
    pub limiter: Option<DefaultDirectRateLimiter>,
}

/// One-way signal which can be both polled and awaited.
#[derive(Debug, Default)]
pub(crate) struct Flag {
    set: AtomicBool,
    notify: Notify,
}

impl Flag {
    pub fn set(&self) {
        self.set.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    pub async fn wait(&self) {
        // NOTE: A `Notified` receives `notify_waiters` from creation, so a `set` between here and
        // the check below is not lost.
        let notified = self.notify.notified();
        if self.is_set() {
            return;
        }
        notified.await;
    }
}

pub(crate) struct VirtualUser<C> {
    pub index: usize,
    pub client: Arc<C>,
    pub iteration: Arc<Iteration>,
    pub stats: Arc<StatsAggregator>,
    /// Set when the controller scales this particular user away.
    pub retire: Arc<Flag>,
    /// Set once for every user when the run ends.
    pub stop: Arc<Flag>,
}

impl<C> VirtualUser<C>
where
    C: HttpClient + Send + Sync + 'static,
{
    /// Iterates until retired or stopped. An in-flight request always completes and is counted;
    /// waiting for the rate limiter or sleeping between iterations is cut short.
    pub async fn run(self) {
        trace!("Virtual user {} started.", self.index);

        while !self.should_exit() {
            if let Some(limiter) = &self.iteration.limiter {
                tokio::select! {
                    biased;
                    _ = self.exit_requested() => break,
                    _ = limiter.until_ready() => {}
                }
            }

            self.iterate().await;

            if let Some(sleep) = self.iteration.sleep {
                tokio::select! {
                    biased;
                    _ = self.exit_requested() => break,
                    _ = tokio::time::sleep(sleep) => {}
                }
            }
        }

        trace!("Virtual user {} exited.", self.index);
    }

    fn should_exit(&self) -> bool {
        self.stop.is_set() || self.retire.is_set()
    }

    async fn exit_requested(&self) {
        tokio::select! {
            _ = self.stop.wait() => {}
            _ = self.retire.wait() => {}
        }
    }

    /// Sends the request once and records its outcome. Rate limiting is left to [`Self::run`].
    pub async fn iterate(&self) -> Vec<CheckResult> {
        let Iteration { request, checks, .. } = &*self.iteration;

        let start = Instant::now();
        let res = self.client.send(request).await;

        let results: Vec<_> = match res {
            Ok(response) => {
                self.stats.record_request(start.elapsed());
                checks.iter().map(|c| c.evaluate(&response)).collect()
            }
            Err(error) => {
                debug!("Virtual user {}: {error}", self.index);
                self.stats.record_transport_error();
                checks.iter().map(Check::failed).collect()
            }
        };

        self.stats.record_checks(&results);
        self.stats.record_iteration();
        results
    }
}
