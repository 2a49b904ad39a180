use crate::collectors::{MetricsProvider, ProviderError};
use crate::render::Renderer;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sampling,
    Rendering,
    Waiting,
    Stopped,
}

#[derive(Debug)]
pub enum TerminationReason {
    IterationLimitReached,
    Cancelled,
    ProviderFailed(ProviderError),
}

impl TerminationReason {
    pub const PROVIDER_FAILED_EXIT_CODE: i32 = 3;

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::IterationLimitReached | Self::Cancelled => 0,
            Self::ProviderFailed(_) => Self::PROVIDER_FAILED_EXIT_CODE,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::IterationLimitReached => "iteration_limit_reached",
            Self::Cancelled => "cancelled",
            Self::ProviderFailed(_) => "provider_failed",
        }
    }
}

/// Drives sample -> render -> wait ticks until a stop condition is met.
pub struct SampleLoop {
    interval: Duration,
    max_iterations: Option<u64>,
    phase: Phase,
    completed: u64,
}

impl SampleLoop {
    pub fn new(interval: Duration, max_iterations: Option<u64>) -> Self {
        Self {
            interval,
            max_iterations,
            phase: Phase::Idle,
            completed: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Runs ticks until the iteration limit, a `true` on `shutdown`, or the
    /// first provider failure. Only the inter-tick wait is interruptible; a
    /// closed `shutdown` channel is never read as a stop request.
    pub async fn run<P, R>(
        &mut self,
        provider: &mut P,
        renderer: &mut R,
        mut shutdown: watch::Receiver<bool>,
    ) -> TerminationReason
    where
        P: MetricsProvider + ?Sized,
        R: Renderer + ?Sized,
    {
        self.completed = 0;
        self.enter(Phase::Idle);
        info!(
            interval_ms = self.interval.as_millis() as u64,
            max_iterations = ?self.max_iterations,
            "sampling loop started"
        );

        loop {
            if *shutdown.borrow_and_update() {
                return self.stop(TerminationReason::Cancelled);
            }
            let tick_started = Instant::now();

            self.enter(Phase::Sampling);
            let snapshot = match provider.sample().await {
                Ok(snapshot) => snapshot,
                Err(err) => return self.stop(TerminationReason::ProviderFailed(err)),
            };
            if let Err(err) = snapshot.validate() {
                return self.stop(TerminationReason::ProviderFailed(err));
            }

            self.enter(Phase::Rendering);
            if let Err(err) = renderer.render(&snapshot) {
                warn!(error = %err, tick = self.completed + 1, "render failed, continuing");
            }
            self.completed += 1;
            debug!(
                tick = self.completed,
                cpu_percent = snapshot.cpu_percent,
                mem_percent = snapshot.mem_percent,
                "tick rendered"
            );

            if self
                .max_iterations
                .is_some_and(|limit| self.completed >= limit)
            {
                return self.stop(TerminationReason::IterationLimitReached);
            }

            self.enter(Phase::Waiting);
            let wait = self.interval.saturating_sub(tick_started.elapsed());
            tokio::select! {
                _ = time::sleep(wait) => {}
                _ = cancellation(&mut shutdown) => {
                    return self.stop(TerminationReason::Cancelled);
                }
            }
        }
    }

    fn enter(&mut self, phase: Phase) {
        trace!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    fn stop(&mut self, reason: TerminationReason) -> TerminationReason {
        self.enter(Phase::Stopped);
        match &reason {
            TerminationReason::ProviderFailed(err) => {
                // the caller owns the user-facing diagnostic
                debug!(error = %err, kind = err.kind(), ticks = self.completed, "sampling loop stopped");
            }
            other => {
                info!(reason = other.label(), ticks = self.completed, "sampling loop stopped");
            }
        }
        reason
    }
}

async fn cancellation(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
