//! Download concurrency limiting
//!
//! Every download holds a [`DownloadSlot`] for as long as its response body
//! is alive. Slots are counted in total and per client address; a request
//! that would exceed either bound is turned away before anything is spawned.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::config::LimitsConfig;

/// Why a slot was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitRejection {
    /// Server-wide limit reached
    Total,
    /// Limit for this client address reached
    PerClient,
}

impl fmt::Display for LimitRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitRejection::Total => f.write_str("server download limit reached"),
            LimitRejection::PerClient => f.write_str("client download limit reached"),
        }
    }
}

#[derive(Debug, Default)]
struct Counts {
    total: usize,
    per_client: HashMap<IpAddr, usize>,
}

#[derive(Debug)]
struct LimiterInner {
    counts: Mutex<Counts>,
    /// Maximum total downloads (0 = unlimited)
    max_total: usize,
    /// Maximum downloads per client (0 = unlimited)
    max_per_client: usize,
}

/// Download limiter shared by all requests
#[derive(Debug, Clone)]
pub struct DownloadLimiter {
    inner: Arc<LimiterInner>,
}

impl DownloadLimiter {
    pub fn new(max_total: usize, max_per_client: usize) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                counts: Mutex::new(Counts::default()),
                max_total,
                max_per_client,
            }),
        }
    }

    pub fn from_config(config: &LimitsConfig) -> Self {
        Self::new(
            config.max_concurrent_downloads,
            config.max_downloads_per_client,
        )
    }

    /// Try to acquire a download slot.
    ///
    /// Requests without a known client address only count against the
    /// total limit.
    pub fn try_acquire(&self, client: Option<IpAddr>) -> Result<DownloadSlot, LimitRejection> {
        let mut counts = self.inner.counts.lock();

        if self.inner.max_total > 0 && counts.total >= self.inner.max_total {
            return Err(LimitRejection::Total);
        }

        if let Some(ip) = client {
            let current = counts.per_client.get(&ip).copied().unwrap_or(0);
            if self.inner.max_per_client > 0 && current >= self.inner.max_per_client {
                return Err(LimitRejection::PerClient);
            }
            counts.per_client.insert(ip, current + 1);
        }
        counts.total += 1;

        Ok(DownloadSlot {
            inner: Arc::clone(&self.inner),
            client,
        })
    }

    /// Number of downloads currently holding a slot
    pub fn active(&self) -> usize {
        self.inner.counts.lock().total
    }

    /// Number of slots held by one client
    pub fn active_for(&self, client: IpAddr) -> usize {
        self.inner
            .counts
            .lock()
            .per_client
            .get(&client)
            .copied()
            .unwrap_or(0)
    }
}

/// A held download slot, released on drop
#[derive(Debug)]
pub struct DownloadSlot {
    inner: Arc<LimiterInner>,
    client: Option<IpAddr>,
}

impl Drop for DownloadSlot {
    fn drop(&mut self) {
        let mut counts = self.inner.counts.lock();
        counts.total = counts.total.saturating_sub(1);

        if let Some(ip) = self.client {
            if let Some(count) = counts.per_client.get_mut(&ip) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    counts.per_client.remove(&ip);
                }
            }
        }
    }
}

/// Client address from the connection, when the server provides it
#[derive(Debug, Clone, Copy)]
pub struct ClientAddr(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
        ))
    }
}
