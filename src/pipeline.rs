//! Resolution / lookup pipeline.
//!
//! For every input item, in order:
//!   1. resolve it to an address (resolve and full modes), or use it verbatim
//!   2. look the address up (lookup and full modes)
//!   3. build one [`Record`]
//!
//! Stage results stay typed inside a `Record` so callers can log or count
//! failure causes. They collapse to the `Unknown` / `N/A` sentinels only in
//! [`Record::row`]. A single item can never fail the run.
//!
//! Items are independent. With `concurrency > 1` several run at once through
//! `StreamExt::buffered`, which still yields results in input order.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{debug, trace};

use crate::lookup::{IpMetadata, LookupError, MetadataLookup, unavailable_fields};
use crate::resolver::{Resolve, ResolveError, UNKNOWN};

/// One output row, fields in header order.
pub type OutputRow = Vec<String>;

/// Stage selection. "Neither stage" has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Inputs are IPs; look up metadata only
    Lookup,
    /// Resolve hostnames only
    Resolve,
    /// Resolve, then look up the resolved address
    Full,
}

impl Mode {
    /// Build from the two stage flags; `None` when neither is set.
    pub fn from_stages(resolve: bool, lookup: bool) -> Option<Self> {
        match (resolve, lookup) {
            (true, true) => Some(Mode::Full),
            (true, false) => Some(Mode::Resolve),
            (false, true) => Some(Mode::Lookup),
            (false, false) => None,
        }
    }

    pub fn resolves(self) -> bool {
        matches!(self, Mode::Resolve | Mode::Full)
    }

    pub fn looks_up(self) -> bool {
        matches!(self, Mode::Lookup | Mode::Full)
    }

    /// CSV header for this mode.
    pub fn headers(self) -> &'static [&'static str] {
        match self {
            Mode::Lookup => &["IP", "ISP", "City", "Country"],
            Mode::Resolve => &["Input", "IP"],
            Mode::Full => &["Input", "IP", "ISP", "City", "Country"],
        }
    }
}

/// Outcome of the resolution stage for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Resolved(IpAddr),
    Unresolved(ResolveError),
}

impl Address {
    /// Text written to the `IP` column.
    pub fn as_field(&self) -> String {
        match self {
            Address::Resolved(ip) => ip.to_string(),
            Address::Unresolved(_) => UNKNOWN.to_string(),
        }
    }

    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Address::Resolved(ip) => Some(*ip),
            Address::Unresolved(_) => None,
        }
    }
}

/// Outcome of the lookup stage for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(IpMetadata),
    Failed(LookupError),
    /// Resolution failed, so there was no address to look up.
    Skipped,
}

impl LookupOutcome {
    pub fn fields(&self) -> [String; 3] {
        match self {
            LookupOutcome::Found(m) => m.fields(),
            LookupOutcome::Failed(_) | LookupOutcome::Skipped => unavailable_fields(),
        }
    }
}

/// Everything the pipeline learned about one input item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub input: String,
    /// `None` when the resolution stage did not run.
    pub address: Option<Address>,
    /// `None` when the lookup stage did not run.
    pub metadata: Option<LookupOutcome>,
}

impl Record {
    /// Render the row. Shape follows which stages ran:
    /// `[input, org, city, country]`, `[input, ip]` or
    /// `[input, ip, org, city, country]`.
    pub fn row(&self) -> OutputRow {
        let mut row = Vec::with_capacity(5);
        row.push(self.input.clone());
        if let Some(ref address) = self.address {
            row.push(address.as_field());
        }
        if let Some(ref outcome) = self.metadata {
            row.extend(outcome.fields());
        }
        row
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub items: usize,
    pub resolved: usize,
    pub resolution_failures: usize,
    pub lookups_found: usize,
    pub lookup_failures: usize,
    pub lookups_skipped: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_records(records: &[Record], elapsed: Duration) -> Self {
        let mut s = RunSummary {
            items: records.len(),
            elapsed,
            ..Default::default()
        };
        for r in records {
            match r.address {
                Some(Address::Resolved(_)) => s.resolved += 1,
                Some(Address::Unresolved(_)) => s.resolution_failures += 1,
                None => {}
            }
            match r.metadata {
                Some(LookupOutcome::Found(_)) => s.lookups_found += 1,
                Some(LookupOutcome::Failed(_)) => s.lookup_failures += 1,
                Some(LookupOutcome::Skipped) => s.lookups_skipped += 1,
                None => {}
            }
        }
        s
    }
}

enum Stages {
    Lookup(Arc<dyn MetadataLookup>),
    Resolve(Arc<dyn Resolve>),
    Full(Arc<dyn Resolve>, Arc<dyn MetadataLookup>),
}

/// Drives the resolver and lookup client over an input list.
pub struct Pipeline {
    stages: Stages,
    concurrency: usize,
}

impl Pipeline {
    pub fn lookup_only(lookup: Arc<dyn MetadataLookup>) -> Self {
        Self::from_stages(Stages::Lookup(lookup))
    }

    pub fn resolve_only(resolver: Arc<dyn Resolve>) -> Self {
        Self::from_stages(Stages::Resolve(resolver))
    }

    pub fn full(resolver: Arc<dyn Resolve>, lookup: Arc<dyn MetadataLookup>) -> Self {
        Self::from_stages(Stages::Full(resolver, lookup))
    }

    fn from_stages(stages: Stages) -> Self {
        Self {
            stages,
            concurrency: 1,
        }
    }

    /// Process up to `n` items at once (values below 1 mean 1).
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn mode(&self) -> Mode {
        match self.stages {
            Stages::Lookup(_) => Mode::Lookup,
            Stages::Resolve(_) => Mode::Resolve,
            Stages::Full(..) => Mode::Full,
        }
    }

    /// Run every item; the result has one record per item, in input order.
    pub async fn run(&self, items: &[String]) -> Vec<Record> {
        stream::iter(items)
            .map(|item| self.process(item))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Run and also return counters for the run.
    pub async fn run_with_summary(&self, items: &[String]) -> (Vec<Record>, RunSummary) {
        let start = Instant::now();
        let records = self.run(items).await;
        let summary = RunSummary::from_records(&records, start.elapsed());
        (records, summary)
    }

    async fn process(&self, item: &str) -> Record {
        let record = match &self.stages {
            Stages::Lookup(lookup) => Record {
                input: item.to_string(),
                address: None,
                metadata: Some(lookup_one(lookup.as_ref(), item).await),
            },
            Stages::Resolve(resolver) => Record {
                input: item.to_string(),
                address: Some(resolve_one(resolver.as_ref(), item).await),
                metadata: None,
            },
            Stages::Full(resolver, lookup) => {
                let address = resolve_one(resolver.as_ref(), item).await;
                let metadata = match address.ip() {
                    Some(ip) => lookup_one(lookup.as_ref(), &ip.to_string()).await,
                    None => LookupOutcome::Skipped,
                };
                Record {
                    input: item.to_string(),
                    address: Some(address),
                    metadata: Some(metadata),
                }
            }
        };
        trace!(input = %record.input, row = ?record.row(), "item processed");
        record
    }
}

async fn resolve_one(resolver: &dyn Resolve, item: &str) -> Address {
    match resolver.resolve(item).await {
        Ok(ip) => Address::Resolved(ip),
        Err(e) => {
            debug!(input = %item, resolver = resolver.name(), error = %e, "resolution failed");
            Address::Unresolved(e)
        }
    }
}

async fn lookup_one(lookup: &dyn MetadataLookup, ip: &str) -> LookupOutcome {
    match lookup.lookup(ip).await {
        Ok(m) => LookupOutcome::Found(m),
        Err(e) => {
            debug!(ip = %ip, error = %e, "metadata lookup failed");
            LookupOutcome::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SystemResolver;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    /// Resolver mapping fixed names; literal IPs pass through.
    fn fake_resolver() -> Arc<dyn Resolve> {
        Arc::new(SystemResolver::with_lookup_fn(
            Duration::from_millis(300),
            |host| match host {
                "example.com" => Ok(vec!["93.184.216.34".parse().unwrap()]),
                "slow.example" => {
                    std::thread::sleep(Duration::from_secs(2));
                    Ok(vec!["192.0.2.1".parse().unwrap()])
                }
                _ => Err(io::Error::other("Name or service not known")),
            },
        ))
    }

    /// Lookup answering from canned bodies, the way the HTTP client parses them.
    struct FakeLookup {
        bodies: HashMap<String, &'static str>,
        calls: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl FakeLookup {
        fn new(bodies: &[(&str, &'static str)]) -> Self {
            Self {
                bodies: bodies.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                calls: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetadataLookup for FakeLookup {
        async fn lookup(&self, ip: &str) -> Result<IpMetadata, LookupError> {
            self.calls.lock().unwrap().push(ip.to_string());
            if let Some(d) = self.delay {
                // Later items finish first.
                let n: u64 = ip.rsplit('.').next().and_then(|s| s.parse().ok()).unwrap_or(0);
                tokio::time::sleep(d.saturating_sub(Duration::from_millis(n * 10))).await;
            }
            match self.bodies.get(ip) {
                Some(body) => IpMetadata::from_json(body.as_bytes()),
                None => Err(LookupError::Status(404)),
            }
        }
    }

    fn items(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mode_from_stages() {
        assert_eq!(Mode::from_stages(true, true), Some(Mode::Full));
        assert_eq!(Mode::from_stages(true, false), Some(Mode::Resolve));
        assert_eq!(Mode::from_stages(false, true), Some(Mode::Lookup));
        assert_eq!(Mode::from_stages(false, false), None);
        assert!(Mode::Full.resolves() && Mode::Full.looks_up());
        assert!(!Mode::Lookup.resolves());
        assert!(!Mode::Resolve.looks_up());
    }

    #[tokio::test]
    async fn resolve_only_scenario() {
        let pipeline = Pipeline::resolve_only(fake_resolver());
        let records = pipeline.run(&items(&["example.com", "10.0.0.1"])).await;
        let rows: Vec<OutputRow> = records.iter().map(Record::row).collect();

        assert_eq!(pipeline.mode().headers(), ["Input", "IP"]);
        assert_eq!(
            rows,
            vec![
                vec!["example.com", "93.184.216.34"],
                vec!["10.0.0.1", "10.0.0.1"],
            ]
        );
    }

    #[tokio::test]
    async fn full_mode_scenario() {
        let lookup = Arc::new(FakeLookup::new(&[
            (
                "93.184.216.34",
                r#"{"org":"ACME","city":"Springfield","country":"US"}"#,
            ),
            ("10.0.0.1", ""),
        ]));
        let pipeline = Pipeline::full(fake_resolver(), lookup.clone());
        let records = pipeline.run(&items(&["example.com", "10.0.0.1"])).await;

        assert_eq!(
            records[0].row(),
            ["example.com", "93.184.216.34", "ACME", "Springfield", "US"]
        );
        assert_eq!(records[1].row(), ["10.0.0.1", "10.0.0.1", "N/A", "N/A", "N/A"]);
        assert!(matches!(
            records[1].metadata,
            Some(LookupOutcome::Failed(LookupError::Decode(_)))
        ));
        assert_eq!(lookup.calls(), ["93.184.216.34", "10.0.0.1"]);
    }

    #[tokio::test]
    async fn failed_resolution_skips_lookup() {
        let lookup = Arc::new(FakeLookup::new(&[]));
        let pipeline = Pipeline::full(fake_resolver(), lookup.clone());
        let records = pipeline.run(&items(&["no-such-host.invalid"])).await;

        assert_eq!(
            records[0].row(),
            ["no-such-host.invalid", "Unknown", "N/A", "N/A", "N/A"]
        );
        assert_eq!(records[0].metadata, Some(LookupOutcome::Skipped));
        assert!(lookup.calls().is_empty());
    }

    #[tokio::test]
    async fn lookup_only_uses_input_verbatim() {
        let lookup = Arc::new(FakeLookup::new(&[(
            "8.8.8.8",
            r#"{"org":"AS15169 Google LLC","city":"Mountain View","country":"US"}"#,
        )]));
        let pipeline = Pipeline::lookup_only(lookup.clone());
        let records = pipeline.run(&items(&["8.8.8.8", "not an ip"])).await;

        assert_eq!(pipeline.mode().headers(), ["IP", "ISP", "City", "Country"]);
        assert_eq!(
            records[0].row(),
            ["8.8.8.8", "AS15169 Google LLC", "Mountain View", "US"]
        );
        assert_eq!(records[1].row(), ["not an ip", "N/A", "N/A", "N/A"]);
        assert_eq!(lookup.calls(), ["8.8.8.8", "not an ip"]);
    }

    #[tokio::test]
    async fn timed_out_resolution_is_unknown() {
        let pipeline = Pipeline::resolve_only(fake_resolver());
        let start = std::time::Instant::now();
        let records = pipeline
            .run(&items(&["slow.example", "example.com"]))
            .await;
        assert!(start.elapsed() < Duration::from_millis(1500));
        assert_eq!(records[0].row(), ["slow.example", "Unknown"]);
        assert!(matches!(
            records[0].address,
            Some(Address::Unresolved(ResolveError::Timeout(_)))
        ));
        assert_eq!(records[1].row(), ["example.com", "93.184.216.34"]);
    }

    #[tokio::test]
    async fn row_count_and_sentinels_hold() {
        let lookup = Arc::new(FakeLookup::new(&[]));
        let pipeline = Pipeline::full(fake_resolver(), lookup);
        let input = items(&["a.invalid", "10.0.0.1", "example.com", "b.invalid", "::1"]);
        let records = pipeline.run(&input).await;

        assert_eq!(records.len(), input.len());
        for (record, item) in records.iter().zip(&input) {
            assert_eq!(&record.input, item);
            let row = record.row();
            assert_eq!(row.len(), 5);
            assert!(row.iter().all(|f| !f.is_empty()), "empty field in {row:?}");
            assert_eq!(&row[2..], ["N/A", "N/A", "N/A"]);
        }
    }

    #[tokio::test]
    async fn concurrent_run_preserves_order() {
        let bodies: Vec<(String, &'static str)> = (1..=8)
            .map(|i| (format!("192.0.2.{i}"), r#"{"org":"X"}"#))
            .collect();
        let mut fake = FakeLookup::new(
            &bodies
                .iter()
                .map(|(k, v)| (k.as_str(), *v))
                .collect::<Vec<_>>(),
        );
        fake.delay = Some(Duration::from_millis(100));

        let input: Vec<String> = (1..=8).map(|i| format!("192.0.2.{i}")).collect();
        let pipeline = Pipeline::lookup_only(Arc::new(fake)).with_concurrency(4);
        let records = pipeline.run(&input).await;

        let order: Vec<&str> = records.iter().map(|r| r.input.as_str()).collect();
        assert_eq!(order, input.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn idempotent_over_identical_input() {
        let lookup = Arc::new(FakeLookup::new(&[(
            "93.184.216.34",
            r#"{"org":"ACME","city":"Springfield","country":"US"}"#,
        )]));
        let pipeline = Pipeline::full(fake_resolver(), lookup);
        let input = items(&["example.com", "10.0.0.1", "bad.invalid"]);

        let first: Vec<OutputRow> = pipeline.run(&input).await.iter().map(Record::row).collect();
        let second: Vec<OutputRow> = pipeline.run(&input).await.iter().map(Record::row).collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn summary_counts() {
        let lookup = Arc::new(FakeLookup::new(&[(
            "93.184.216.34",
            r#"{"org":"ACME"}"#,
        )]));
        let pipeline = Pipeline::full(fake_resolver(), lookup);
        let (records, summary) = pipeline
            .run_with_summary(&items(&["example.com", "10.0.0.1", "bad.invalid"]))
            .await;

        assert_eq!(records.len(), 3);
        assert_eq!(summary.items, 3);
        assert_eq!(summary.resolved, 2);
        assert_eq!(summary.resolution_failures, 1);
        assert_eq!(summary.lookups_found, 1);
        assert_eq!(summary.lookup_failures, 1);
        assert_eq!(summary.lookups_skipped, 1);
    }

    #[tokio::test]
    async fn empty_input_yields_no_rows() {
        let pipeline = Pipeline::resolve_only(fake_resolver());
        assert!(pipeline.run(&[]).await.is_empty());
    }
}
