//! Ramp controller: a single ticker which scales the pool of virtual users to follow a run plan.
use crate::client::HttpClient;
use crate::stats::StatsAggregator;
use crate::timer::Timer;
use crate::user::{Flag, Iteration, VirtualUser};
use arc_swap::ArcSwap;
use rampage_core::{Progress, RunPlan, RunState, SpawnError, PROGRESS_INTERVAL};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

pub(crate) struct RampController<C> {
    plan: RunPlan,
    tick: Duration,
    pool: UserPool<C>,
    stats: Arc<StatsAggregator>,
    progress: Arc<ArcSwap<Progress>>,
    stop: Arc<Flag>,
}

impl<C> RampController<C>
where
    C: HttpClient + Send + Sync + 'static,
{
    pub fn new(
        plan: RunPlan,
        tick: Duration,
        pool: UserPool<C>,
        progress: Arc<ArcSwap<Progress>>,
    ) -> Self {
        let stats = pool.stats.clone();
        let stop = pool.stop.clone();
        Self {
            plan,
            tick,
            pool,
            stats,
            progress,
            stop,
        }
    }

    /// Drives the plan to completion (or until stopped), then drains every virtual user.
    /// Returns the total run time.
    #[instrument(name = "ramp", skip_all)]
    pub async fn run(mut self) -> Duration {
        let start = Instant::now();
        let mut timer = Timer::new(self.tick).await;
        let mut current_stage = None;
        let mut next_report = PROGRESS_INTERVAL;

        debug!("Controller ticking every {timer}.");

        // NOTE: Targets are computed from the run start rather than accumulated per tick, so
        // delayed ticks never stretch the run.
        loop {
            if self.stop.is_set() {
                info!("Stop requested; ending run early.");
                break;
            }

            let elapsed = start.elapsed();
            let Some(point) = self.plan.point_at(elapsed) else {
                break;
            };

            if current_stage != Some(point.stage) {
                current_stage = Some(point.stage);
                let stage = self.plan.stages()[point.stage];
                info!(
                    "Stage {}/{}: ramping to {} users over {}.",
                    point.stage + 1,
                    self.plan.stages().len(),
                    stage.target,
                    humantime::format_duration(stage.duration)
                );
            }

            if let Err(error) = self.pool.scale_to(point.concurrency) {
                warn!(
                    "Only {} of {} users running: {error} Retrying next tick.",
                    self.pool.active(),
                    point.concurrency
                );
                self.stats.record_run_error();
            }

            let active = self.pool.active();
            self.stats.observe_users(active);
            self.publish(RunState::Ramping(point.stage), elapsed, point.concurrency);

            if elapsed >= next_report {
                next_report += PROGRESS_INTERVAL;
                let stats = self.stats.snapshot(elapsed);
                info!(
                    "{} elapsed, {} users, {} requests, {} checks failed.",
                    humantime::format_duration(round_to_tick(elapsed, self.tick)),
                    active,
                    stats.requests,
                    stats.checks_failed
                );
            }

            timer.tick().await;
        }

        let elapsed = start.elapsed();
        self.publish(RunState::Draining, elapsed, 0);
        info!("Draining {} virtual users.", self.pool.live());
        self.pool.shutdown().await;

        let elapsed = start.elapsed();
        self.publish(RunState::Completed, elapsed, 0);
        elapsed
    }

    fn publish(&self, state: RunState, elapsed: Duration, desired_users: usize) {
        self.progress.store(Arc::new(Progress {
            state,
            elapsed,
            active_users: self.pool.active(),
            desired_users,
        }));
    }
}

fn round_to_tick(elapsed: Duration, tick: Duration) -> Duration {
    let tick = tick.as_nanos().max(1);
    let nanos = elapsed.as_nanos() / tick * tick;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

struct UserHandle {
    retire: Arc<Flag>,
    task: JoinHandle<()>,
}

/// The set of running virtual users.
///
/// Users are retired last-in-first-out. A retired user is no longer counted as active, but it is
/// tracked until its current iteration ends so that it still counts against `max_users` and is
/// awaited on shutdown.
pub(crate) struct UserPool<C> {
    client: Arc<C>,
    iteration: Arc<Iteration>,
    stats: Arc<StatsAggregator>,
    stop: Arc<Flag>,
    active: Vec<UserHandle>,
    retiring: Vec<JoinHandle<()>>,
    next_index: usize,
    max_users: Option<usize>,
}

impl<C> UserPool<C>
where
    C: HttpClient + Send + Sync + 'static,
{
    pub fn new(
        client: Arc<C>,
        iteration: Arc<Iteration>,
        stats: Arc<StatsAggregator>,
        stop: Arc<Flag>,
        max_users: Option<usize>,
    ) -> Self {
        Self {
            client,
            iteration,
            stats,
            stop,
            active: vec![],
            retiring: vec![],
            next_index: 0,
            max_users,
        }
    }

    pub fn active(&self) -> usize {
        self.active.len()
    }

    pub fn live(&self) -> usize {
        self.active.len() + self.retiring.len()
    }

    pub fn scale_to(&mut self, desired: usize) -> Result<(), SpawnError> {
        self.reap();

        if self.active.len() > desired {
            trace!("Retiring {} users.", self.active.len() - desired);
            for user in self.active.drain(desired..) {
                user.retire.set();
                self.retiring.push(user.task);
            }
        }

        while self.active.len() < desired {
            self.spawn_user()?;
        }

        Ok(())
    }

    fn spawn_user(&mut self) -> Result<(), SpawnError> {
        if let Some(limit) = self.max_users {
            if self.live() >= limit {
                return Err(SpawnError::Exhausted { limit });
            }
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SpawnError::NoRuntime)?;

        let retire = Arc::new(Flag::default());
        let user = VirtualUser {
            index: self.next_index,
            client: self.client.clone(),
            iteration: self.iteration.clone(),
            stats: self.stats.clone(),
            retire: retire.clone(),
            stop: self.stop.clone(),
        };
        self.next_index += 1;

        let task = runtime.spawn(user.run());
        self.active.push(UserHandle { retire, task });
        Ok(())
    }

    fn reap(&mut self) {
        self.retiring.retain(|task| !task.is_finished());
    }

    /// Signals every user to stop and waits for their in-flight iterations.
    pub async fn shutdown(&mut self) {
        self.stop.set();

        let tasks = self
            .active
            .drain(..)
            .map(|user| user.task)
            .chain(self.retiring.drain(..));

        for task in tasks {
            if let Err(error) = task.await {
                error!("Virtual user terminated abnormally: {error}");
                self.stats.record_run_error();
            }
        }
    }
}
