use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::report::{Stats, Summary};
use crate::schedule::Schedule;
use crate::workload::{Iteration, Workload};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Handle to one virtual user. Flipping `stop` retires it: the task observes
/// the flag between iterations, so an in-flight request always completes.
struct VirtualUser {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Drives the load schedule: spawns and retires virtual-user tasks to track
/// the scheduled concurrency, and feeds their outcomes to a recorder task.
pub struct Runner {
    workload: Arc<dyn Workload>,
    schedule: Schedule,
    tick: Duration,
}

impl Runner {
    pub fn new(workload: Arc<dyn Workload>, schedule: Schedule, tick: Duration) -> Self {
        Self {
            workload,
            schedule,
            tick,
        }
    }

    /// Run the schedule to completion, or until `shutdown` resolves.
    /// Either way every virtual user is retired, in-flight iterations drain,
    /// and the aggregated summary is returned.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Summary {
        let (tx, rx) = mpsc::unbounded_channel::<Iteration>();
        let recorder = tokio::spawn(record_iterations(rx));

        let started = Instant::now();
        let started_at = chrono::Utc::now();
        let total = self.schedule.total_duration();

        let mut active: Vec<VirtualUser> = Vec::new();
        let mut retired: Vec<JoinHandle<()>> = Vec::new();
        let mut peak_vus: u32 = 0;

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_progress = Instant::now();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, retiring all virtual users");
                    break;
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= total {
                break;
            }

            let desired = self.schedule.vus_at(elapsed) as usize;
            self.converge(&tx, &mut active, &mut retired, desired);
            peak_vus = peak_vus.max(active.len() as u32);

            if last_progress.elapsed() >= PROGRESS_INTERVAL {
                tracing::info!(
                    active = active.len(),
                    desired = desired,
                    elapsed_secs = elapsed.as_secs(),
                    "Load progress"
                );
                last_progress = Instant::now();
            }
        }

        // Ramp everything down and wait for in-flight iterations to finish.
        for user in &active {
            let _ = user.stop.send(true);
        }
        for user in active {
            let _ = user.handle.await;
        }
        for handle in retired {
            let _ = handle.await;
        }

        drop(tx);
        let stats = recorder.await.unwrap_or_default();

        tracing::info!(
            iterations = stats.iterations(),
            elapsed_secs = started.elapsed().as_secs(),
            "Load run finished"
        );

        stats.into_summary(started_at, started.elapsed(), peak_vus)
    }

    fn converge(
        &self,
        tx: &mpsc::UnboundedSender<Iteration>,
        active: &mut Vec<VirtualUser>,
        retired: &mut Vec<JoinHandle<()>>,
        desired: usize,
    ) {
        while active.len() < desired {
            active.push(spawn_user(Arc::clone(&self.workload), tx.clone()));
        }

        if active.len() > desired {
            // Most recently spawned users retire first.
            for user in active.drain(desired..) {
                let _ = user.stop.send(true);
                retired.push(user.handle);
            }
        }
    }
}

fn spawn_user(workload: Arc<dyn Workload>, tx: mpsc::UnboundedSender<Iteration>) -> VirtualUser {
    let (stop, mut stop_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        while !*stop_rx.borrow() {
            let iteration = workload.run_once().await;
            if tx.send(iteration).is_err() {
                break;
            }
        }
    });

    VirtualUser { stop, handle }
}

async fn record_iterations(mut rx: mpsc::UnboundedReceiver<Iteration>) -> Stats {
    let mut stats = Stats::new();
    while let Some(iteration) = rx.recv().await {
        stats.record(&iteration);
    }
    stats
}
