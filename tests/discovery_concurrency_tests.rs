//! Concurrency cap, isolation and idempotence of discovery batches
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use monograph_sync_lib::application::{DiscoveryOrchestrator, IdentifierMapper};
use monograph_sync_lib::domain::{DiscoveryOutcome, ProductIdentifier, SourceCode};
use monograph_sync_lib::infrastructure::{FetchError, MonographPageFetcher, MonographPageParser, PageResponse};

const HANGING_CODE: &str = "hang";

/// Counts in-flight calls and records when each code finished
struct InstrumentedFetcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
    timeout: Duration,
    finished: Mutex<Vec<(String, Instant)>>,
}

impl InstrumentedFetcher {
    fn new(delay: Duration, timeout: Duration) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
            timeout,
            finished: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MonographPageFetcher for InstrumentedFetcher {
    async fn fetch(&self, code: &SourceCode) -> Result<PageResponse, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = if code.as_str() == HANGING_CODE {
            tokio::time::sleep(self.timeout).await;
            Err(FetchError::Transport {
                url: format!("https://example.org/pm-mp.do?code={code}"),
                message: "operation timed out".into(),
                timed_out: true,
            })
        } else {
            tokio::time::sleep(self.delay).await;
            Ok(PageResponse {
                url: format!("https://health-products.canada.ca/dpd-bdpp/pm-mp.do?lang=en&code={code}"),
                status: 200,
                body: format!(
                    r#"<table><tr><td>Revision Date:</td><td>14-May-2023</td></tr></table>
                       <a href="https://health-products.canada.ca/pm/{code}_fra.pdf">FR</a>
                       <a href="https://health-products.canada.ca/pm/{code}_eng.pdf">EN</a>"#
                ),
            })
        };

        self.finished
            .lock()
            .unwrap()
            .push((code.as_str().to_string(), Instant::now()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn identifiers(count: usize) -> Vec<(ProductIdentifier, Option<SourceCode>)> {
    (0..count)
        .map(|i| {
            (
                ProductIdentifier::new(format!("{:08}", i)),
                SourceCode::parse(&format!("{}", 1000 + i)),
            )
        })
        .collect()
}

fn orchestrator(fetcher: Arc<InstrumentedFetcher>, pairs: Vec<(ProductIdentifier, Option<SourceCode>)>) -> DiscoveryOrchestrator {
    DiscoveryOrchestrator::new(
        fetcher,
        Arc::new(MonographPageParser::new().unwrap()),
        Arc::new(IdentifierMapper::from_pairs(pairs)),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_fetches_never_exceed_the_cap() {
    let fetcher = Arc::new(InstrumentedFetcher::new(Duration::from_millis(25), Duration::from_secs(1)));
    let pairs = identifiers(40);
    let ids: Vec<_> = pairs.iter().map(|(din, _)| din.clone()).collect();

    let records = orchestrator(Arc::clone(&fetcher), pairs).discover_batch(ids, 5).await;

    assert_eq!(records.len(), 40);
    assert!(records.values().all(|r| r.outcome.is_discovered()));
    let peak = fetcher.peak.load(Ordering::SeqCst);
    assert!(peak <= 5, "peak in-flight fetches was {peak}");
    assert!(peak > 1, "fetches never overlapped");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_hanging_identifier_does_not_serialize_the_rest() {
    let timeout = Duration::from_millis(800);
    let fetcher = Arc::new(InstrumentedFetcher::new(Duration::from_millis(10), timeout));

    let mut pairs = identifiers(30);
    let hanging = ProductIdentifier::new("99999999");
    pairs.insert(0, (hanging.clone(), SourceCode::parse(HANGING_CODE)));
    let ids: Vec<_> = pairs.iter().map(|(din, _)| din.clone()).collect();

    let started = Instant::now();
    let records = orchestrator(Arc::clone(&fetcher), pairs).discover_batch(ids, 4).await;
    let elapsed = started.elapsed();

    assert_eq!(records.len(), 31);
    assert!(matches!(records[&hanging].outcome, DiscoveryOutcome::TransportFailure { .. }));
    assert_eq!(
        records.values().filter(|r| r.outcome.is_discovered()).count(),
        30
    );

    // Siblings finish while the hanging fetch still holds its slot
    let finished = fetcher.finished.lock().unwrap();
    let hang_done = finished
        .iter()
        .find(|(code, _)| code == HANGING_CODE)
        .map(|(_, at)| *at)
        .unwrap();
    assert!(finished
        .iter()
        .filter(|(code, _)| code != HANGING_CODE)
        .all(|(_, at)| *at < hang_done));

    // The whole batch costs one timeout, not one per failure
    assert!(elapsed < timeout + Duration::from_millis(600), "batch took {elapsed:?}");
}

#[tokio::test]
async fn rerunning_a_batch_yields_identical_results() {
    let fetcher = Arc::new(InstrumentedFetcher::new(Duration::from_millis(1), Duration::from_millis(50)));
    let mut pairs = identifiers(12);
    pairs.push((ProductIdentifier::new("unmapped"), None));
    let ids: Vec<_> = pairs.iter().map(|(din, _)| din.clone()).collect();
    let orchestrator = orchestrator(fetcher, pairs);

    let first: HashMap<_, _> = orchestrator
        .discover_batch(ids.clone(), 3)
        .await
        .into_iter()
        .map(|(din, record)| (din, record.outcome))
        .collect();
    let second: HashMap<_, _> = orchestrator
        .discover_batch(ids, 3)
        .await
        .into_iter()
        .map(|(din, record)| (din, record.outcome))
        .collect();

    assert_eq!(first, second);
    assert_eq!(first[&ProductIdentifier::new("unmapped")], DiscoveryOutcome::Unmapped);

    let result = first[&ProductIdentifier::new("00000000")].result();
    assert_eq!(
        result.reference_url.as_deref(),
        Some("https://health-products.canada.ca/pm/1000_eng.pdf")
    );
    assert_eq!(result.revision_date.as_deref(), Some("2023-05-14"));
}
