//! Run Dispatch Loop
//!
//! Drives one assistant run to completion. The run's state is only ever
//! observed: the loop sleeps, polls the status, and reacts. When the run
//! pauses for callbacks, every requested function is executed and the whole
//! batch of outputs is submitted in one call.
//!
//! The loop stops on completion, on a failed run, on an unknown callback
//! name, when its time budget is spent, or when its cancellation token
//! fires. Cancellation and the budget also interrupt remote calls and
//! callback handlers in flight; a batch interrupted that way is never
//! submitted. Time is read from an injected [`Clock`] so tests never sleep.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assistant::{
    AssistantClient, CallbackRequest, CallbackResult, ConversationTurn, RunHandle, RunStatus,
};
use crate::error::{DeckError, Result};
use crate::registry::FunctionRegistry;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Source of time for the dispatch loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by the tokio timer.
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

pub struct DispatchLoop {
    client: Arc<dyn AssistantClient>,
    registry: Arc<FunctionRegistry>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    budget: Option<Duration>,
    cancel: CancellationToken,
}

impl DispatchLoop {
    /// Creates a loop polling every [`DEFAULT_POLL_INTERVAL`] with no time
    /// budget and a fresh cancellation token.
    pub fn new(client: Arc<dyn AssistantClient>, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            client,
            registry,
            clock: Arc::new(TokioClock),
            poll_interval: DEFAULT_POLL_INTERVAL,
            budget: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// `None` polls until the run finishes, however long that takes.
    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A token that stops [`DispatchLoop::drive`] when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Polls `run` until it completes and returns the thread's conversation.
    pub async fn drive(&self, run: &RunHandle) -> Result<Vec<ConversationTurn>> {
        let started = self.clock.now();
        let mut polls: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(self.cancelled(run, polls)),
                _ = self.clock.sleep(self.poll_interval) => {}
            }

            if let Some(budget) = self.budget {
                if self.clock.now().duration_since(started) >= budget {
                    return Err(self.timed_out(run, budget, polls));
                }
            }

            polls += 1;
            let status = self
                .interruptible(run, started, polls, self.client.retrieve_run(run))
                .await?;
            match status {
                RunStatus::Completed => {
                    info!(run_id = %run.run_id, polls, "Run completed");
                    return self
                        .interruptible(run, started, polls, self.client.list_turns(&run.thread_id))
                        .await;
                }
                RunStatus::Failed(reason) => {
                    return Err(DeckError::RunFailed {
                        run_id: run.run_id.clone(),
                        reason,
                    });
                }
                RunStatus::RequiresCallback(requests) => {
                    info!(run_id = %run.run_id, count = requests.len(), "Run requires callbacks");
                    // Resolving and submitting form one unit: an interrupted
                    // batch is dropped before anything reaches the run.
                    let batch = async {
                        let results = self.resolve_batch(&requests).await?;
                        self.client.submit_callback_results(run, results).await
                    };
                    self.interruptible(run, started, polls, batch).await?;
                    info!(run_id = %run.run_id, "Callback results submitted");
                }
                status @ (RunStatus::Queued | RunStatus::Running) => {
                    debug!(run_id = %run.run_id, ?status, "Waiting for the assistant");
                }
            }
        }
    }

    /// Awaits `work` unless the token fires or the budget runs out first.
    ///
    /// `work` is polled before the deadline, so work that is already done
    /// wins a tie with an exhausted budget.
    async fn interruptible<T>(
        &self,
        run: &RunHandle,
        started: Instant,
        polls: u64,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let deadline = async {
            match self.budget {
                Some(budget) => {
                    let spent = self.clock.now().duration_since(started);
                    self.clock.sleep(budget.saturating_sub(spent)).await;
                    budget
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.cancelled(run, polls)),
            result = work => result,
            budget = deadline => Err(self.timed_out(run, budget, polls)),
        }
    }

    fn cancelled(&self, run: &RunHandle, polls: u64) -> DeckError {
        warn!(run_id = %run.run_id, polls, "Run polling cancelled");
        DeckError::Cancelled {
            run_id: run.run_id.clone(),
        }
    }

    fn timed_out(&self, run: &RunHandle, budget: Duration, polls: u64) -> DeckError {
        warn!(run_id = %run.run_id, ?budget, polls, "Run exceeded its time budget");
        DeckError::Timeout {
            run_id: run.run_id.clone(),
            budget,
        }
    }

    /// Executes every request of one batch, in order.
    ///
    /// All names are checked before anything runs, so an unknown name never
    /// leaves half a batch executed.
    async fn resolve_batch(&self, requests: &[CallbackRequest]) -> Result<Vec<CallbackResult>> {
        for request in requests {
            self.registry.ensure_known(&request.function_name)?;
        }

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let output = self
                .registry
                .call(&request.function_name, &request.arguments)
                .await?;
            results.push(CallbackResult {
                id: request.id.clone(),
                output,
            });
        }
        Ok(results)
    }
}
