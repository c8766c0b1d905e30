//! Concurrent fan-out of one query to every eligible source.
//!
//! Only one search session is live at a time. Starting a new search, or
//! calling [`SearchEngine::cancel`], aborts the running session's tasks and
//! discards anything they would still report.

use crate::client::fetch::Fetcher;
use crate::client::providers::{ProviderError, SourceProvider};
use crate::client::record::{Category, Record};
use crate::client::registry::SourceRegistry;
use futures::{FutureExt, Stream, StreamExt};
use serde::Serialize;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Lifecycle of the current search session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    /// Tasks are being spawned
    FanningOut,
    /// Waiting for the remaining outcomes
    Draining,
}

/// What one source produced for a session
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source_id: String,
    pub source_name: String,
    pub elapsed: Duration,
    pub result: Result<Vec<Record>, ProviderError>,
}

impl SourceOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Number of records, zero for failures
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.result.as_ref().map_or(0, Vec::len)
    }
}

/// Summary of a fully drained session
#[derive(Debug, Clone, Default)]
pub struct AggregatedResults {
    /// Every record, in outcome order
    pub records: Vec<Record>,
    /// Records grouped by source id
    pub by_source: HashMap<String, Vec<Record>>,
    /// Errors from failed sources, keyed by source id
    pub errors: HashMap<String, ProviderError>,
    pub successful: usize,
    pub failed: usize,
    pub total_time: Duration,
}

struct Accumulator {
    generation: u64,
    records: Vec<Record>,
}

struct Shared {
    accumulator: Mutex<Accumulator>,
    state: watch::Sender<SessionState>,
}

impl Shared {
    /// Record an outcome if `generation` is still the live session.
    ///
    /// Returns false once the session has been superseded.
    async fn deliver(
        &self,
        generation: u64,
        outcome: SourceOutcome,
        sink: &mpsc::UnboundedSender<SourceOutcome>,
    ) -> bool {
        let mut accumulator = self.accumulator.lock().await;
        if accumulator.generation != generation {
            debug!("Discarding late outcome from {}", outcome.source_id);
            return false;
        }
        if let Ok(records) = &outcome.result {
            accumulator.records.extend(records.iter().cloned());
        }
        // the receiver may already be gone; the accumulator still holds the records
        let _ = sink.send(outcome);
        true
    }

    /// Move to `state` unless a newer session took over
    async fn transition(&self, generation: u64, state: SessionState) {
        let accumulator = self.accumulator.lock().await;
        if accumulator.generation == generation {
            self.state.send_replace(state);
        }
    }
}

/// Aggregation engine over a [`SourceRegistry`]
pub struct SearchEngine {
    registry: Arc<SourceRegistry>,
    fetcher: Arc<dyn Fetcher>,
    shared: Arc<Shared>,
    current: Mutex<Option<CancellationToken>>,
}

impl SearchEngine {
    /// Create a new engine; every source request goes through `fetcher`
    #[must_use]
    pub fn new(registry: SourceRegistry, fetcher: Arc<dyn Fetcher>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            registry: Arc::new(registry),
            fetcher,
            shared: Arc::new(Shared {
                accumulator: Mutex::new(Accumulator {
                    generation: 0,
                    records: Vec::new(),
                }),
                state,
            }),
            current: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Start a search, superseding any session still running.
    ///
    /// Outcomes arrive on the returned session in completion order, one per
    /// eligible source.
    pub async fn search(
        &self,
        query: &str,
        category: Category,
        enabled: &HashSet<String>,
    ) -> SearchSession {
        let token = CancellationToken::new();
        // the live token and the live generation change together, so the
        // last caller to get here owns both
        let generation = {
            let mut current = self.current.lock().await;
            if let Some(previous) = current.replace(token.clone()) {
                debug!("Superseding running search session");
                previous.cancel();
            }

            let mut accumulator = self.shared.accumulator.lock().await;
            accumulator.generation += 1;
            accumulator.records.clear();
            self.shared.state.send_replace(SessionState::FanningOut);
            accumulator.generation
        };

        let providers = self.registry.eligible(enabled, category);
        let id = Uuid::new_v4();
        let expected = providers.len();
        let (sink, receiver) = mpsc::unbounded_channel();

        let span = info_span!("search", session = %id, query = %query, category = %category);
        let driver = Driver {
            shared: Arc::clone(&self.shared),
            fetcher: Arc::clone(&self.fetcher),
            generation,
            token: token.clone(),
            sink,
        };
        tokio::spawn(driver.run(query.to_string(), category, providers).instrument(span));

        SearchSession {
            id,
            expected,
            started: Instant::now(),
            token,
            receiver,
        }
    }

    /// Snapshot of every record received by the current session so far
    pub async fn results(&self) -> Vec<Record> {
        self.shared.accumulator.lock().await.records.clone()
    }

    /// Stop the running session, if any, and clear its results
    pub async fn cancel(&self) {
        let mut current = self.current.lock().await;
        if let Some(token) = current.take() {
            token.cancel();
            info!("Search cancelled");
        }
        let mut accumulator = self.shared.accumulator.lock().await;
        accumulator.generation += 1;
        accumulator.records.clear();
        self.shared.state.send_replace(SessionState::Idle);
    }
}

/// Owns the task group of one session
struct Driver {
    shared: Arc<Shared>,
    fetcher: Arc<dyn Fetcher>,
    generation: u64,
    token: CancellationToken,
    sink: mpsc::UnboundedSender<SourceOutcome>,
}

impl Driver {
    async fn run(self, query: String, category: Category, providers: Vec<Arc<dyn SourceProvider>>) {
        let started = Instant::now();
        info!(
            "Starting search for '{}' across {} sources",
            query,
            providers.len()
        );

        let mut tasks = JoinSet::new();
        for provider in providers {
            let fetcher = Arc::clone(&self.fetcher);
            let query = query.clone();
            let span = info_span!("source", id = %provider.id());
            tasks.spawn(
                async move { run_provider(provider, &query, category, fetcher.as_ref()).await }
                    .instrument(span),
            );
        }
        self.shared.transition(self.generation, SessionState::Draining).await;

        let (mut succeeded, mut failed) = (0usize, 0usize);
        loop {
            tokio::select! {
                () = self.token.cancelled() => {
                    tasks.abort_all();
                    info!("Search session superseded after {:?}", started.elapsed());
                    return;
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    let outcome = match joined {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!("Source task ended abnormally: {}", e);
                            continue;
                        }
                    };
                    if outcome.is_success() {
                        succeeded += 1;
                    } else {
                        failed += 1;
                    }
                    if !self.shared.deliver(self.generation, outcome, &self.sink).await {
                        tasks.abort_all();
                        return;
                    }
                }
            }
        }

        self.shared.transition(self.generation, SessionState::Idle).await;
        info!(
            "Search finished in {:?}: {} sources succeeded, {} failed",
            started.elapsed(),
            succeeded,
            failed
        );
    }
}

async fn run_provider(
    provider: Arc<dyn SourceProvider>,
    query: &str,
    category: Category,
    fetcher: &dyn Fetcher,
) -> SourceOutcome {
    let started = Instant::now();
    let result = AssertUnwindSafe(provider.search(query, category, fetcher))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(ProviderError::Panicked(panic_message(payload.as_ref()))));
    let elapsed = started.elapsed();

    match &result {
        Ok(records) => info!("Provider {} returned {} results", provider.id(), records.len()),
        Err(e) => warn!("Provider {} failed: {}", provider.id(), e),
    }

    SourceOutcome {
        source_id: provider.id().to_string(),
        source_name: provider.name().to_string(),
        elapsed,
        result,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Live view of one search; ends when every outcome has arrived or the
/// session is superseded
pub struct SearchSession {
    id: Uuid,
    expected: usize,
    started: Instant,
    token: CancellationToken,
    receiver: mpsc::UnboundedReceiver<SourceOutcome>,
}

impl SearchSession {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Number of sources this session fanned out to
    #[must_use]
    pub const fn expected(&self) -> usize {
        self.expected
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drain every remaining outcome
    pub async fn collect_all(mut self) -> AggregatedResults {
        let mut aggregated = AggregatedResults::default();
        while let Some(outcome) = self.next().await {
            match outcome.result {
                Ok(records) => {
                    aggregated.successful += 1;
                    aggregated.records.extend(records.iter().cloned());
                    aggregated
                        .by_source
                        .entry(outcome.source_id)
                        .or_default()
                        .extend(records);
                }
                Err(e) => {
                    aggregated.failed += 1;
                    aggregated.errors.insert(outcome.source_id, e);
                }
            }
        }
        aggregated.total_time = self.started.elapsed();
        aggregated
    }
}

impl Stream for SearchSession {
    type Item = SourceOutcome;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fetch::test_support::StubFetcher;
    use crate::client::providers::SourceDescriptor;
    use crate::client::record::TorrentId;
    use async_trait::async_trait;

    enum Behavior {
        Rows(usize),
        Fail,
        Panic,
        Hang,
    }

    struct Fake {
        descriptor: SourceDescriptor,
        behavior: Behavior,
    }

    #[async_trait]
    impl SourceProvider for Fake {
        fn descriptor(&self) -> &SourceDescriptor {
            &self.descriptor
        }

        async fn search(
            &self,
            query: &str,
            _category: Category,
            _fetcher: &dyn Fetcher,
        ) -> Result<Vec<Record>, ProviderError> {
            match self.behavior {
                Behavior::Rows(n) => Ok((0..n).map(|i| record(&self.descriptor, query, i)).collect()),
                Behavior::Fail => Err(ProviderError::ServiceUnavailable("down".to_string())),
                Behavior::Panic => panic!("parser bug"),
                Behavior::Hang => futures::future::pending().await,
            }
        }
    }

    fn record(descriptor: &SourceDescriptor, query: &str, i: usize) -> Record {
        Record {
            name: format!("{query} {i}"),
            size: "1.00 GB".to_string(),
            seeders: 1,
            peers: 1,
            date: "2024-01-05".to_string(),
            category: None,
            source_id: descriptor.id.clone(),
            source_name: descriptor.name.clone(),
            description_url: String::new(),
            id: TorrentId::hash(&format!("{:040x}", i + 1)).unwrap(),
        }
    }

    fn fake(id: &str, behavior: Behavior) -> Arc<dyn SourceProvider> {
        Arc::new(Fake {
            descriptor: SourceDescriptor::builtin(id, id, "https://example.org", Category::All),
            behavior,
        })
    }

    fn engine(providers: Vec<Arc<dyn SourceProvider>>) -> (SearchEngine, HashSet<String>) {
        let enabled = providers.iter().map(|p| p.id().to_string()).collect();
        let engine = SearchEngine::new(
            SourceRegistry::new(providers),
            Arc::new(StubFetcher::new()),
        );
        (engine, enabled)
    }

    #[tokio::test]
    async fn test_one_outcome_per_source() {
        let (engine, enabled) = engine(vec![
            fake("a", Behavior::Rows(2)),
            fake("b", Behavior::Fail),
            fake("c", Behavior::Rows(3)),
        ]);

        let session = engine.search("ubuntu", Category::All, &enabled).await;
        assert_eq!(session.expected(), 3);
        let results = session.collect_all().await;

        assert_eq!(results.successful, 2);
        assert_eq!(results.failed, 1);
        assert_eq!(results.records.len(), 5);
        assert_eq!(results.by_source["c"].len(), 3);
        assert!(matches!(results.errors["b"], ProviderError::ServiceUnavailable(_)));
        assert_eq!(engine.results().await.len(), 5);
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_panicking_source_becomes_outcome() {
        let (engine, enabled) = engine(vec![fake("ok", Behavior::Rows(1)), fake("bad", Behavior::Panic)]);

        let results = engine.search("x", Category::All, &enabled).await.collect_all().await;
        assert_eq!(results.successful, 1);
        assert_eq!(
            results.errors["bad"],
            ProviderError::Panicked("parser bug".to_string())
        );
    }

    #[tokio::test]
    async fn test_no_eligible_sources_ends_immediately() {
        let (engine, _) = engine(vec![fake("a", Behavior::Rows(1))]);
        let session = engine.search("x", Category::All, &HashSet::new()).await;
        assert_eq!(session.expected(), 0);
        let results = session.collect_all().await;
        assert_eq!(results.successful + results.failed, 0);
    }

    #[tokio::test]
    async fn test_new_search_supersedes_running_session() {
        let (engine, enabled) = engine(vec![fake("fast", Behavior::Rows(2)), fake("slow", Behavior::Hang)]);

        let mut first = engine.search("first", Category::All, &enabled).await;
        let outcome = first.next().await.unwrap();
        assert_eq!(outcome.source_id, "fast");
        assert_eq!(engine.results().await.len(), 2);
        assert_eq!(engine.state(), SessionState::Draining);

        let mut second = engine.search("second", Category::All, &enabled).await;
        assert!(first.next().await.is_none());
        assert!(first.is_cancelled());

        let outcome = second.next().await.unwrap();
        assert_eq!(outcome.source_id, "fast");
        let names: Vec<String> = engine.results().await.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["second 0", "second 1"]);
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_searches_leave_one_live_session() {
        let (engine, enabled) = engine(vec![fake("a", Behavior::Rows(1)), fake("b", Behavior::Rows(2))]);
        let engine = Arc::new(engine);

        for round in 0..200 {
            let searches: Vec<_> = ["left", "right"]
                .into_iter()
                .map(|query| {
                    let engine = Arc::clone(&engine);
                    let enabled = enabled.clone();
                    tokio::spawn(async move { engine.search(query, Category::All, &enabled).await })
                })
                .collect();

            let mut live = Vec::new();
            for search in searches {
                let session = search.await.unwrap();
                if !session.is_cancelled() {
                    live.push(session);
                }
            }
            assert_eq!(live.len(), 1, "round {round}");

            let results = live.pop().unwrap().collect_all().await;
            assert_eq!(results.successful, 2, "round {round}");
            assert_eq!(results.records.len(), 3, "round {round}");
            assert_eq!(engine.results().await.len(), 3, "round {round}");
            assert_eq!(engine.state(), SessionState::Idle, "round {round}");
        }
    }

    #[tokio::test]
    async fn test_cancel_clears_results() {
        let (engine, enabled) = engine(vec![fake("fast", Behavior::Rows(1)), fake("slow", Behavior::Hang)]);

        let mut session = engine.search("x", Category::All, &enabled).await;
        session.next().await.unwrap();
        {
            let mut pending = tokio_test::task::spawn(session.next());
            tokio_test::assert_pending!(pending.poll());
        }
        engine.cancel().await;

        let mut ended = tokio_test::task::spawn(session.next());
        assert!(tokio_test::assert_ready!(ended.poll()).is_none());
        drop(ended);
        assert!(engine.results().await.is_empty());
        assert_eq!(engine.state(), SessionState::Idle);
    }
}
