//! Execution worker: runs one shard of queries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::extractor::ResultExtractor;
use crate::partition::WorkShard;
use crate::proxy::{ProxyConfig, ProxyPool};
use crate::transport::Transport;
use crate::{ExecutionResult, Query, TransportError};

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, not yet started.
    Idle,
    /// Processing its shard.
    Running,
    /// Every query in the shard was processed, or the run was cancelled.
    Done,
    /// The worker could not get a proxy for its first query.
    Failed,
}

/// Collaborators shared by all workers of one run.
pub struct RunContext {
    /// Proxy pool shared across workers.
    pub pool: Arc<ProxyPool>,
    /// Issues the outbound requests.
    pub transport: Arc<dyn Transport>,
    /// Turns payloads into leads.
    pub extractor: Arc<dyn ResultExtractor>,
    /// Upper bound on each outbound request.
    pub request_timeout: Duration,
    /// Checked between queries.
    pub cancel: CancellationToken,
}

/// What a worker hands back to the coordinator.
#[derive(Debug)]
pub struct WorkerReport {
    /// Index of the shard the worker ran.
    pub worker_id: usize,
    /// Final state.
    pub state: WorkerState,
    /// One entry per processed query, in shard order.
    pub results: Vec<ExecutionResult>,
    /// Whether the worker stopped early on cancellation.
    pub cancelled: bool,
}

impl WorkerReport {
    /// Report for a worker that never finished its shard; every query is
    /// recorded as failed with `reason`.
    pub fn failed(worker_id: usize, queries: Vec<Query>, reason: &str) -> Self {
        Self {
            worker_id,
            state: WorkerState::Failed,
            results: queries
                .into_iter()
                .map(|q| ExecutionResult::failure(q, reason))
                .collect(),
            cancelled: false,
        }
    }
}

/// Processes the queries of one shard sequentially.
///
/// Per-query failures are recorded and never stop the worker; only a
/// failure to obtain a proxy for the first query moves it to
/// [`WorkerState::Failed`].
pub struct Worker {
    worker_id: usize,
    queries: Vec<Query>,
    ctx: Arc<RunContext>,
    state: WorkerState,
}

impl Worker {
    /// Creates an idle worker owning `shard`.
    pub fn new(shard: WorkShard, ctx: Arc<RunContext>) -> Self {
        Self {
            worker_id: shard.worker_id,
            queries: shard.queries,
            ctx,
            state: WorkerState::Idle,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Runs the shard to completion.
    pub async fn run(mut self) -> WorkerReport {
        self.state = WorkerState::Running;
        debug!("Worker {} started with {} queries", self.worker_id, self.queries.len());

        let mut results = Vec::with_capacity(self.queries.len());
        let mut cancelled = false;
        let mut pending = std::mem::take(&mut self.queries).into_iter();

        while let Some(query) = pending.next() {
            if self.ctx.cancel.is_cancelled() {
                debug!("Worker {} cancelled after {} queries", self.worker_id, results.len());
                cancelled = true;
                break;
            }

            let started = Instant::now();
            let proxy = match self.ctx.pool.acquire().await {
                Ok(proxy) => proxy,
                Err(e) if results.is_empty() => {
                    warn!("Worker {} failed to start: {}", self.worker_id, e);
                    self.state = WorkerState::Failed;
                    let reason = e.to_string();
                    // Unstarted queries stay out of a cancelled run.
                    if self.ctx.cancel.is_cancelled() {
                        let mut report = WorkerReport::failed(self.worker_id, vec![query], &reason);
                        report.cancelled = true;
                        return report;
                    }
                    return WorkerReport::failed(
                        self.worker_id,
                        std::iter::once(query).chain(pending).collect(),
                        &reason,
                    );
                }
                Err(e) => {
                    results.push(
                        ExecutionResult::failure(query, e.to_string())
                            .with_duration(elapsed_ms(started)),
                    );
                    continue;
                }
            };

            let result = self.execute_query(query, proxy).await;
            results.push(result.with_duration(elapsed_ms(started)));
        }

        self.state = WorkerState::Done;
        WorkerReport {
            worker_id: self.worker_id,
            state: self.state,
            results,
            cancelled,
        }
    }

    async fn execute_query(&self, query: Query, proxy: ProxyConfig) -> ExecutionResult {
        let ctx = &self.ctx;
        let fetched = timeout(ctx.request_timeout, ctx.transport.fetch(&query, &proxy))
            .await
            .unwrap_or(Err(TransportError::Timeout));

        let result = match fetched {
            Err(e) => {
                debug!(
                    "Worker {} query {} via {} failed: {}",
                    self.worker_id,
                    query.position,
                    proxy.key(),
                    e
                );
                ctx.pool.report_failure(&proxy).await;
                ExecutionResult::failure(query, format!("transport error: {}", e))
            }
            Ok(payload) => {
                ctx.pool.report_success(&proxy).await;
                match ctx.extractor.extract(&payload) {
                    Ok(leads) => {
                        debug!(
                            "Worker {} query {} returned {} leads",
                            self.worker_id,
                            query.position,
                            leads.len()
                        );
                        ExecutionResult::success(query, leads)
                    }
                    Err(e) => ExecutionResult::failure(query, format!("extraction error: {}", e)),
                }
            }
        };

        result.with_proxy(proxy.key())
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
