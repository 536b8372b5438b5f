//! Fan-out/fan-in run orchestration.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{DorkConfig, ProxySource};
use crate::extractor::{HtmlLeadExtractor, ResultExtractor};
use crate::partition::{partition, validate_worker_count};
use crate::proxy::{ProxyPool, RemoteProxyProvider};
use crate::transport::{HttpTransport, Transport};
use crate::worker::{RunContext, Worker, WorkerReport, WorkerState};
use crate::{DorkError, QueryGenerator, Result, RunResult};

/// Runs a niche's queries across parallel workers and merges their results.
///
/// Each call to [`execute`](Coordinator::execute) is an independent run
/// with its own context; the only state shared between workers is the
/// proxy pool.
pub struct Coordinator {
    pool: Arc<ProxyPool>,
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn ResultExtractor>,
    generator: QueryGenerator,
    request_timeout: Duration,
}

impl Coordinator {
    /// Creates a coordinator with the default query templates.
    pub fn new<T, X>(pool: Arc<ProxyPool>, transport: T, extractor: X) -> Self
    where
        T: Transport + 'static,
        X: ResultExtractor + 'static,
    {
        Self {
            pool,
            transport: Arc::new(transport),
            extractor: Arc::new(extractor),
            generator: QueryGenerator::new(),
            request_timeout: Duration::from_secs(15),
        }
    }

    /// Builds the pool, HTTP transport and HTML extractor described by
    /// `config`.
    pub async fn from_config(config: &DorkConfig) -> Result<Self> {
        config.request.validate()?;
        config.proxy.validate()?;
        let generator = config.query_generator()?;
        let settings = config.proxy.pool_settings();

        let pool = match config.proxy.source {
            ProxySource::StaticList => {
                ProxyPool::with_proxies(config.proxy.static_proxies()?, settings).await?
            }
            ProxySource::RemoteEndpoint => {
                let endpoint = config.proxy.remote_endpoint().ok_or_else(|| {
                    DorkError::Config("remote-endpoint source needs an endpoint".into())
                })?;
                let provider = RemoteProxyProvider::new(endpoint)
                    .map_err(|e| DorkError::PoolInit(e.to_string()))?;
                ProxyPool::initialize(provider, settings).await?
            }
        };

        Ok(Self::new(
            Arc::new(pool),
            HttpTransport::new(config.request.clone()),
            HtmlLeadExtractor::new(),
        )
        .with_generator(generator)
        .with_request_timeout(config.request.timeout()))
    }

    /// Replaces the query generator.
    pub fn with_generator(mut self, generator: QueryGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the proxy pool.
    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    /// Returns the query generator.
    pub fn generator(&self) -> &QueryGenerator {
        &self.generator
    }

    /// Runs every query generated for `niche` across `worker_count` workers.
    pub async fn execute(&self, niche: &str, worker_count: i64) -> Result<RunResult> {
        self.execute_with_cancellation(niche, worker_count, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Coordinator::execute), stopping cooperatively once
    /// `cancel` fires. In-flight requests finish; queries not yet started
    /// are dropped and the result is flagged as cancelled.
    pub async fn execute_with_cancellation(
        &self,
        niche: &str,
        worker_count: i64,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let start = Instant::now();

        let queries = self.generator.generate(niche)?;
        let planned = queries.len();
        // Empty shards have nothing to run and get no task.
        let shards: Vec<_> = partition(queries, worker_count)?
            .into_iter()
            .filter(|shard| !shard.is_empty())
            .collect();

        if self.pool.healthy_count().await == 0 {
            return Err(DorkError::PoolExhausted {
                total: self.pool.len().await,
            });
        }

        info!(
            "Starting run for '{}': {} queries across {} workers",
            niche.trim(),
            planned,
            shards.len()
        );

        let ctx = Arc::new(RunContext {
            pool: Arc::clone(&self.pool),
            transport: Arc::clone(&self.transport),
            extractor: Arc::clone(&self.extractor),
            request_timeout: self.request_timeout,
            cancel,
        });

        let workers: Vec<_> = shards
            .into_iter()
            .map(|shard| {
                let worker_id = shard.worker_id;
                let fallback = shard.queries.clone();
                let handle = tokio::spawn(Worker::new(shard, Arc::clone(&ctx)).run());
                async move {
                    match handle.await {
                        Ok(report) => report,
                        Err(e) => {
                            warn!("Worker {} aborted: {}", worker_id, e);
                            let reason = format!("worker aborted: {}", e);
                            WorkerReport::failed(worker_id, fallback, &reason)
                        }
                    }
                }
            })
            .collect();

        // join_all yields in shard order regardless of completion order.
        let reports = join_all(workers).await;

        let failed_workers = reports
            .iter()
            .filter(|r| r.state == WorkerState::Failed)
            .count();
        let cancelled = reports.iter().any(|r| r.cancelled);
        let results = reports.into_iter().flat_map(|r| r.results).collect();

        let mut run = RunResult::new(planned, results, cancelled);
        run.set_duration(start.elapsed().as_millis() as u64);

        info!(
            "Run for '{}' finished: {} succeeded, {} failed{} in {}ms",
            niche.trim(),
            run.succeeded,
            run.failed,
            if cancelled { " (cancelled)" } else { "" },
            run.duration_ms
        );

        if !cancelled && run.queries > 0 && run.succeeded == 0 {
            return Err(DorkError::RunFailed {
                attempted: run.queries,
                failed_workers,
            });
        }

        Ok(run)
    }
}

/// Runs `niche` with the pool, transport and extractor described by `config`.
///
/// The niche and worker count are checked before the proxy pool is built.
pub async fn execute(niche: &str, worker_count: i64, config: &DorkConfig) -> Result<RunResult> {
    validate_worker_count(worker_count)?;
    config.query_generator()?.generate(niche)?;

    Coordinator::from_config(config)
        .await?
        .execute(niche, worker_count)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::extractor::{FnExtractor, Lead};
    use crate::proxy::{PoolSettings, ProxyConfig};
    use crate::{ExtractionError, Query, TransportError, MAX_WORKERS};

    /// Fails the queries whose positions are listed.
    struct ScriptedTransport {
        fail_positions: HashSet<usize>,
        calls: Mutex<Vec<usize>>,
    }

    impl ScriptedTransport {
        fn new(fail_positions: &[usize]) -> Self {
            Self {
                fail_positions: fail_positions.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch(
            &self,
            query: &Query,
            _proxy: &ProxyConfig,
        ) -> std::result::Result<String, TransportError> {
            self.calls.lock().unwrap().push(query.position);
            if self.fail_positions.contains(&query.position) {
                Err(TransportError::Request("connection reset".into()))
            } else {
                Ok(format!("payload-{}", query.position))
            }
        }
    }

    fn lead_extractor(
    ) -> FnExtractor<impl Fn(&str) -> std::result::Result<Vec<Lead>, ExtractionError>> {
        FnExtractor::new(|payload: &str| {
            Ok(vec![Lead::new(format!("https://{}.test", payload), payload, "")])
        })
    }

    fn ten_query_generator() -> QueryGenerator {
        QueryGenerator::with_templates((0..10).map(|i| format!("{{niche}} q{}", i))).unwrap()
    }

    async fn pool(threshold: u32) -> Arc<ProxyPool> {
        let proxies = (0..4).map(|i| ProxyConfig::new("10.0.0.1", 8000 + i)).collect();
        Arc::new(
            ProxyPool::with_proxies(
                proxies,
                PoolSettings {
                    failure_threshold: threshold,
                    ..PoolSettings::default()
                },
            )
            .await
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_execute_all_succeed() {
        let transport = Arc::new(ScriptedTransport::new(&[]));
        let coordinator = Coordinator::new(pool(3).await, Arc::clone(&transport), lead_extractor());

        let run = coordinator.execute("pets", 2).await.unwrap();
        assert_eq!(run.planned, 4);
        assert_eq!(run.queries, 4);
        assert_eq!(run.succeeded, 4);
        assert_eq!(run.failed, 0);
        assert!(!run.cancelled);
        assert_eq!(run.leads().count(), 4);
        assert_eq!(transport.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_execute_partial_failure_keeps_order() {
        let transport = Arc::new(ScriptedTransport::new(&[3, 7]));
        let coordinator = Coordinator::new(pool(100).await, transport, lead_extractor())
            .with_generator(ten_query_generator());

        let run = coordinator.execute("pets", 2).await.unwrap();
        assert_eq!(run.queries, 10);
        assert_eq!(run.succeeded, 8);
        assert_eq!(run.failed, 2);

        let positions: Vec<usize> = run.results().iter().map(|r| r.query.position).collect();
        assert_eq!(positions, (0..10).collect::<Vec<_>>());
        assert!(!run.results()[3].success);
        assert!(!run.results()[7].success);
    }

    #[tokio::test]
    async fn test_execute_more_workers_than_queries() {
        let transport = Arc::new(ScriptedTransport::new(&[]));
        let coordinator = Coordinator::new(pool(3).await, transport, lead_extractor());

        let run = coordinator.execute("pets", 9).await.unwrap();
        assert_eq!(run.queries, 4);
        assert_eq!(run.succeeded, 4);
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_input() {
        let transport = Arc::new(ScriptedTransport::new(&[]));
        let coordinator = Coordinator::new(pool(3).await, Arc::clone(&transport), lead_extractor());

        assert!(matches!(
            coordinator.execute("", 2).await,
            Err(DorkError::InvalidNiche(_))
        ));
        assert!(matches!(
            coordinator.execute("pets", 0).await,
            Err(DorkError::InvalidWorkerCount(0))
        ));
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_all_quarantined_is_pool_exhausted() {
        let transport = Arc::new(ScriptedTransport::new(&[]));
        let pool = pool(3).await;
        for i in 0..4 {
            pool.quarantine(&ProxyConfig::new("10.0.0.1", 8000 + i)).await;
        }
        let coordinator = Coordinator::new(pool, Arc::clone(&transport), lead_extractor());

        assert!(matches!(
            coordinator.execute("pets", 2).await,
            Err(DorkError::PoolExhausted { total: 4 })
        ));
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_no_success_is_run_failed() {
        let transport = Arc::new(ScriptedTransport::new(&[0, 1, 2, 3]));
        let coordinator = Coordinator::new(pool(100).await, transport, lead_extractor());

        assert!(matches!(
            coordinator.execute("pets", 2).await,
            Err(DorkError::RunFailed { attempted: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_extraction_failures_only_is_run_failed() {
        let transport = Arc::new(ScriptedTransport::new(&[]));
        let extractor = FnExtractor::new(|_: &str| Err(ExtractionError::Blocked));
        let coordinator = Coordinator::new(pool(3).await, transport, extractor);

        let err = coordinator.execute("pets", 1).await.unwrap_err();
        assert!(matches!(err, DorkError::RunFailed { attempted: 4, failed_workers: 0 }));
    }

    #[tokio::test]
    async fn test_execute_cancelled_before_start() {
        let transport = Arc::new(ScriptedTransport::new(&[]));
        let coordinator = Coordinator::new(pool(3).await, transport, lead_extractor());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let run = coordinator
            .execute_with_cancellation("pets", 2, cancel)
            .await
            .unwrap();
        assert!(run.cancelled);
        assert_eq!(run.queries, 0);
        assert_eq!(run.planned, 4);
    }

    #[tokio::test]
    async fn test_from_config_static_list() {
        let config = DorkConfig::from_json(
            r#"{"proxy":{"proxies":["10.0.0.1:8080","10.0.0.2:8080"]},"templates":["{niche} a"]}"#,
        )
        .unwrap();
        let coordinator = Coordinator::from_config(&config).await.unwrap();
        assert_eq!(coordinator.pool().len().await, 2);
        assert_eq!(coordinator.generator().templates().len(), 1);
    }

    #[tokio::test]
    async fn test_from_config_empty_static_list_is_pool_init() {
        let result = Coordinator::from_config(&DorkConfig::default()).await;
        assert!(matches!(result, Err(DorkError::PoolInit(_))));
    }

    #[tokio::test]
    async fn test_from_config_rejects_zero_timeout() {
        let config = DorkConfig::from_json(
            r#"{"proxy":{"proxies":["10.0.0.1:8080"]},"request":{"timeout_seconds":0}}"#,
        )
        .unwrap();
        assert!(matches!(
            Coordinator::from_config(&config).await,
            Err(DorkError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_from_config_unreachable_remote_endpoint_is_pool_init() {
        let config = DorkConfig::from_json(
            r#"{"proxy":{"source":"remote-endpoint","endpoint":"http://127.0.0.1:9/proxies"}}"#,
        )
        .unwrap();
        assert!(matches!(
            Coordinator::from_config(&config).await,
            Err(DorkError::PoolInit(_))
        ));
    }

    #[tokio::test]
    async fn test_free_execute_checks_inputs_before_building_pool() {
        // The default config has no proxies, so reaching the pool would
        // report PoolInit instead.
        let config = DorkConfig::default();
        assert!(matches!(
            execute("two words", 2, &config).await,
            Err(DorkError::InvalidNiche(_))
        ));
        assert!(matches!(
            execute("pets", 0, &config).await,
            Err(DorkError::InvalidWorkerCount(0))
        ));
        assert!(matches!(
            execute("pets", i64::MAX, &config).await,
            Err(DorkError::InvalidWorkerCount(i64::MAX))
        ));
        assert!(matches!(
            execute("pets", 2, &config).await,
            Err(DorkError::PoolInit(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_rejects_huge_worker_count() {
        let transport = Arc::new(ScriptedTransport::new(&[]));
        let coordinator = Coordinator::new(pool(3).await, Arc::clone(&transport), lead_extractor());

        assert!(matches!(
            coordinator.execute("pets", i64::MAX).await,
            Err(DorkError::InvalidWorkerCount(i64::MAX))
        ));
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_max_workers_runs_only_non_empty_shards() {
        let transport = Arc::new(ScriptedTransport::new(&[]));
        let coordinator = Coordinator::new(pool(3).await, Arc::clone(&transport), lead_extractor());

        let run = coordinator.execute("pets", MAX_WORKERS).await.unwrap();
        assert_eq!(run.queries, 4);
        assert_eq!(run.succeeded, 4);
        let positions: Vec<usize> = run.results().iter().map(|r| r.query.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_from_config_rejects_bad_template() {
        let config = DorkConfig::from_json(
            r#"{"proxy":{"proxies":["10.0.0.1:8080"]},"templates":["no placeholder"]}"#,
        )
        .unwrap();
        assert!(matches!(
            Coordinator::from_config(&config).await,
            Err(DorkError::InvalidTemplate(_))
        ));
    }
}
