//! Per-query and per-run result types.

use serde::{Deserialize, Serialize};

use crate::{Lead, Query};

/// Outcome of one query attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The query that was attempted.
    pub query: Query,
    /// Whether the request and extraction both succeeded.
    pub success: bool,
    /// Extracted leads, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leads: Option<Vec<Lead>>,
    /// Failure description, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Proxy used (`host:port`), if one was acquired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Time spent on this query in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Creates a successful result.
    pub fn success(query: Query, leads: Vec<Lead>) -> Self {
        Self {
            query,
            success: true,
            leads: Some(leads),
            error: None,
            proxy: None,
            duration_ms: 0,
        }
    }

    /// Creates a failed result.
    pub fn failure(query: Query, error: impl Into<String>) -> Self {
        Self {
            query,
            success: false,
            leads: None,
            error: Some(error.into()),
            proxy: None,
            duration_ms: 0,
        }
    }

    /// Records the proxy used.
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Records the time spent.
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Returns the leads, empty on failure.
    pub fn leads(&self) -> &[Lead] {
        self.leads.as_deref().unwrap_or_default()
    }
}

/// Aggregate output of one run.
///
/// `queries == results.len() == succeeded + failed` always holds. For a
/// run that was not cancelled, `queries == planned`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// Number of queries generated for the run.
    pub planned: usize,
    /// Number of queries that produced a result.
    pub queries: usize,
    /// Number of successful results.
    pub succeeded: usize,
    /// Number of failed results.
    pub failed: usize,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
    /// Results in shard order, then in-shard order.
    results: Vec<ExecutionResult>,
}

impl RunResult {
    /// Builds a run result from ordered per-query results.
    pub fn new(planned: usize, results: Vec<ExecutionResult>, cancelled: bool) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            planned,
            queries: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            cancelled,
            duration_ms: 0,
            results,
        }
    }

    /// Returns the results.
    pub fn results(&self) -> &[ExecutionResult] {
        &self.results
    }

    /// Consumes the run result, returning the results.
    pub fn into_results(self) -> Vec<ExecutionResult> {
        self.results
    }

    /// Iterates over every lead from successful results, in result order.
    pub fn leads(&self) -> impl Iterator<Item = &Lead> {
        self.results.iter().flat_map(ExecutionResult::leads)
    }

    /// Sets the run duration.
    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
    }
}
