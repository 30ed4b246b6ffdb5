/*!
Hostname resolution with a hard deadline.

Two back-ends implement [`Resolve`]:

- [`SystemResolver`] asks the operating system (`getaddrinfo`, so `/etc/hosts`
  and nsswitch apply). That call blocks with no timeout parameter, so it runs
  on a dedicated worker thread and the caller waits on a oneshot channel under
  `tokio::time::timeout`. When the deadline passes the worker is abandoned,
  not killed; its late result is dropped with the channel.
- [`DnsResolver`] uses the async trust-dns stub resolver built from
  `/etc/resolv.conf`, bounded by the same outer timeout.

Neither touches process-wide state (signals, interval timers), so one call can
never affect the next.

Literal IP inputs short-circuit both back-ends and come back unchanged.
*/

use std::fmt;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::timeout;
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{ResolverConfig, ResolverOpts},
    system_conf,
};

use crate::errors::{EnrichError, Result};

/// Sentinel written in place of an address that could not be resolved.
pub const UNKNOWN: &str = "Unknown";

/// Why a single resolution did not produce an address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("resolution did not finish within {0:?}")]
    Timeout(Duration),

    #[error("no addresses returned for {host}")]
    NoAddresses { host: String },

    #[error("resolution failed for {host}: {reason}")]
    Failed { host: String, reason: String },

    #[error("resolver worker failed: {0}")]
    Worker(String),
}

/// Resolver implementation selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ResolverBackend {
    /// Operating system resolver (getaddrinfo)
    #[default]
    System,
    /// Async DNS stub resolver using /etc/resolv.conf
    Dns,
}

impl fmt::Display for ResolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverBackend::System => f.write_str("system"),
            ResolverBackend::Dns => f.write_str("dns"),
        }
    }
}

impl FromStr for ResolverBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(ResolverBackend::System),
            "dns" => Ok(ResolverBackend::Dns),
            other => Err(format!(
                "unknown resolver backend '{other}' (expected system or dns)"
            )),
        }
    }
}

/// Hostname → address resolution, bounded by the implementation's deadline.
#[async_trait]
pub trait Resolve: Send + Sync {
    fn name(&self) -> &'static str;
    async fn resolve(&self, host: &str) -> std::result::Result<IpAddr, ResolveError>;
}

/// Parse `host` as a literal address (bracketed IPv6 accepted).
pub fn literal_ip(host: &str) -> Option<IpAddr> {
    let trimmed = host.trim();
    let bare = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);
    bare.parse().ok()
}

/// Pick the address reported for a host: the first IPv4 if there is one,
/// otherwise the first address of any family.
pub fn preferred_address<I>(addrs: I) -> Option<IpAddr>
where
    I: IntoIterator<Item = IpAddr>,
{
    let mut first = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        first.get_or_insert(addr);
    }
    first
}

/// Run a blocking closure on a detached worker thread and wait for its result
/// for at most `deadline`.
///
/// On expiry the worker keeps running until its call returns, then exits; the
/// caller gets `ResolveError::Timeout` immediately.
pub async fn run_with_deadline<T, F>(deadline: Duration, f: F) -> std::result::Result<T, ResolveError>
where
    F: FnOnce() -> std::result::Result<T, ResolveError> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name("ipenrich-resolve".into())
        .spawn(move || {
            // Receiver is gone if the deadline already passed.
            let _ = tx.send(f());
        })
        .map_err(|e| ResolveError::Worker(e.to_string()))?;

    match timeout(deadline, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(ResolveError::Worker(
            "worker exited without a result".into(),
        )),
        Err(_) => Err(ResolveError::Timeout(deadline)),
    }
}

type LookupFn = dyn Fn(&str) -> io::Result<Vec<IpAddr>> + Send + Sync;

/// Operating-system resolver with a hard per-call deadline.
#[derive(Clone)]
pub struct SystemResolver {
    deadline: Duration,
    lookup: Arc<LookupFn>,
}

impl SystemResolver {
    pub fn new(deadline: Duration) -> Self {
        Self::with_lookup_fn(deadline, getaddrinfo)
    }

    /// Use `lookup` in place of `getaddrinfo`. The function runs on the worker
    /// thread and may block for as long as it likes.
    pub fn with_lookup_fn<F>(deadline: Duration, lookup: F) -> Self
    where
        F: Fn(&str) -> io::Result<Vec<IpAddr>> + Send + Sync + 'static,
    {
        Self {
            deadline,
            lookup: Arc::new(lookup),
        }
    }
}

impl fmt::Debug for SystemResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemResolver")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

fn getaddrinfo(host: &str) -> io::Result<Vec<IpAddr>> {
    (host, 0u16)
        .to_socket_addrs()
        .map(|iter| iter.map(|sa| sa.ip()).collect())
}

#[async_trait]
impl Resolve for SystemResolver {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn resolve(&self, host: &str) -> std::result::Result<IpAddr, ResolveError> {
        if let Some(ip) = literal_ip(host) {
            return Ok(ip);
        }

        let lookup = Arc::clone(&self.lookup);
        let owned = host.to_string();
        run_with_deadline(self.deadline, move || match lookup(&owned) {
            Ok(addrs) => preferred_address(addrs).ok_or(ResolveError::NoAddresses { host: owned }),
            Err(e) => Err(ResolveError::Failed {
                host: owned,
                reason: e.to_string(),
            }),
        })
        .await
    }
}

const INNER_TIMEOUT_SLACK: Duration = Duration::from_millis(100);

/// Async DNS stub resolver with a per-call deadline.
pub struct DnsResolver {
    inner: TokioAsyncResolver,
    deadline: Duration,
}

impl DnsResolver {
    /// Build from `/etc/resolv.conf` (or the platform equivalent).
    pub fn from_system_conf(deadline: Duration) -> Result<Self> {
        let (config, opts) = system_conf::read_system_conf()
            .map_err(|e| EnrichError::resolver_init("dns", e.to_string()))?;
        Ok(Self::with_config(config, opts, deadline))
    }

    pub fn with_config(config: ResolverConfig, mut opts: ResolverOpts, deadline: Duration) -> Self {
        // The outer deadline decides; the per-query timer only fires after it.
        opts.timeout = deadline + INNER_TIMEOUT_SLACK;
        opts.attempts = 1;
        Self {
            inner: TokioAsyncResolver::tokio(config, opts),
            deadline,
        }
    }
}

#[async_trait]
impl Resolve for DnsResolver {
    fn name(&self) -> &'static str {
        "dns"
    }

    async fn resolve(&self, host: &str) -> std::result::Result<IpAddr, ResolveError> {
        if let Some(ip) = literal_ip(host) {
            return Ok(ip);
        }

        match timeout(self.deadline, self.inner.lookup_ip(host)).await {
            Ok(Ok(answer)) => {
                preferred_address(answer.iter()).ok_or_else(|| ResolveError::NoAddresses {
                    host: host.to_string(),
                })
            }
            Ok(Err(e)) => Err(ResolveError::Failed {
                host: host.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ResolveError::Timeout(self.deadline)),
        }
    }
}

/// Build the resolver selected by `backend`.
pub fn build_resolver(backend: ResolverBackend, deadline: Duration) -> Result<Arc<dyn Resolve>> {
    match backend {
        ResolverBackend::System => Ok(Arc::new(SystemResolver::new(deadline))),
        ResolverBackend::Dns => Ok(Arc::new(DnsResolver::from_system_conf(deadline)?)),
    }
}
