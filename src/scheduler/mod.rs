//! Recurring background jobs.
//!
//! Each registered job runs in its own tokio task on a fixed interval. An
//! execution is awaited before the next tick is considered, it gets a
//! deadline, and a panic inside it is caught and counted as a failed run.

mod context;
pub mod jobs;

pub use context::JobContext;

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info, info_span, warn};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job was cancelled")]
    Cancelled,

    #[error("Job failed: {0:#}")]
    Failed(#[from] anyhow::Error),

    #[error("Job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    const fn outcome(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
            Self::Panicked(_) => "panicked",
        }
    }
}

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError>;
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub struct Scheduler {
    jobs: Vec<Arc<dyn Job>>,
    job_timeout: Duration,
    shutdown: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
    span: Span,
}

impl Scheduler {
    #[must_use]
    pub fn new(job_timeout: Duration) -> Self {
        Self {
            jobs: Vec::new(),
            job_timeout,
            shutdown: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
            span: Span::none(),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn register(&mut self, job: Arc<dyn Job>) {
        info!(job_name = job.name(), interval_secs = job.interval().as_secs(), "Registered job");
        self.jobs.push(job);
    }

    /// Shares the scheduler's shutdown signal with other workers.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    #[must_use]
    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|j| j.name()).collect()
    }

    /// Spawns one loop per job. The first execution happens one full
    /// interval after start. Calling this twice has no effect.
    pub async fn start(&self) {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            warn!("Scheduler already started");
            return;
        }

        info!(jobs = self.jobs.len(), "Starting background scheduler");
        for job in &self.jobs {
            let job = Arc::clone(job);
            let shutdown = self.shutdown.clone();
            let timeout = self.job_timeout;
            let span = info_span!(parent: &self.span, "job", job_name = job.name());
            handles.push(tokio::spawn(
                Self::run_loop(job, shutdown, timeout).instrument(span),
            ));
        }
    }

    /// Signals shutdown and waits for every job loop. In-flight executions
    /// observe cancellation through their context and are not aborted.
    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        self.shutdown.cancel();

        let handles = std::mem::take(&mut *self.handles.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Job loop ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }

    /// Runs a registered job once, outside its schedule.
    pub async fn run_now(&self, name: &str) -> Result<(), JobError> {
        let job = self
            .jobs
            .iter()
            .find(|j| j.name() == name)
            .ok_or_else(|| JobError::Failed(anyhow::anyhow!("Unknown job: {name}")))?;

        let span = info_span!(parent: &self.span, "job", job_name = job.name());
        Self::execute(job.as_ref(), &self.shutdown, self.job_timeout)
            .instrument(span)
            .await
    }

    async fn run_loop(job: Arc<dyn Job>, shutdown: CancellationToken, timeout: Duration) {
        let period = job.interval().max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Outcome is logged and counted inside execute.
            let _ = Self::execute(job.as_ref(), &shutdown, timeout).await;
        }
    }

    async fn execute(
        job: &dyn Job,
        shutdown: &CancellationToken,
        timeout: Duration,
    ) -> Result<(), JobError> {
        let name = job.name();
        let ctx = JobContext::new(shutdown.child_token(), timeout);
        let start = std::time::Instant::now();
        info!(event = "job_started", job_name = name, "Starting job");

        let run = AssertUnwindSafe(job.run(&ctx)).catch_unwind();
        tokio::pin!(run);

        let caught = tokio::select! {
            out = &mut run => out,
            () = tokio::time::sleep_until(ctx.deadline()) => {
                warn!(event = "job_deadline_exceeded", job_name = name, "Job ran past its deadline, cancelling");
                ctx.cancel();
                run.await
            }
        };

        let result = caught.unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(&*payload))));
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let outcome = match &result {
            Ok(()) => {
                info!(event = "job_finished", job_name = name, duration_ms, "Job finished");
                "success"
            }
            Err(JobError::Cancelled) => {
                warn!(event = "job_cancelled", job_name = name, duration_ms, "Job cancelled");
                "cancelled"
            }
            Err(e) => {
                error!(event = "job_failed", job_name = name, duration_ms, error = %e, "Job failed");
                e.outcome()
            }
        };

        metrics::counter!("job_runs_total", "job" => name, "outcome" => outcome).increment(1);
        metrics::histogram!("job_duration_seconds", "job" => name).record(start.elapsed().as_secs_f64());

        result
    }
}
