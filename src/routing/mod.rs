//! Client routing decision: direct versus tunneled.
//!
//! In pac mode, destinations inside the local-region IP table bypass the
//! tunnel. The table is shared read-mostly state: queries take the reader
//! lock, periodic rule reloads take the writer lock.

mod ranges;

pub use ranges::{IpRange, RangeTable};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::timeout;

use crate::config::ProxyMode;
use crate::protocol::{Host, TargetAddr};

/// DNS lookup budget for pac decisions.
const DNS_TIMEOUT: Duration = Duration::from_secs(2);

/// Where a destination should be dialed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Dial the destination directly
    Direct,
    /// Dial through the tunnel
    Proxy,
}

/// Routing decision engine.
pub struct Router {
    mode: ProxyMode,
    table: RwLock<RangeTable>,
}

impl Router {
    /// Create a router with an empty table.
    pub fn new(mode: ProxyMode) -> Self {
        Self {
            mode,
            table: RwLock::new(RangeTable::default()),
        }
    }

    /// Replace the interval table from rule text. Returns the merged
    /// interval count.
    pub fn load_rules(&self, text: &str) -> usize {
        let table = RangeTable::parse(text);
        let count = table.len();
        *self.table.write() = table;
        count
    }

    /// Decide where to dial `target`.
    ///
    /// Pac mode fails toward the proxy: an unresolvable domain must not
    /// leak onto the direct path.
    pub async fn decide(&self, target: &TargetAddr) -> Route {
        match self.mode {
            ProxyMode::Global => Route::Proxy,
            ProxyMode::Direct => Route::Direct,
            ProxyMode::Pac => self.decide_pac(target).await,
        }
    }

    async fn decide_pac(&self, target: &TargetAddr) -> Route {
        match &target.host {
            Host::Ipv4(ip) => self.route_for(*ip),
            // the rule table is IPv4-only; IPv6 destinations stay tunneled
            Host::Ipv6(_) => Route::Proxy,
            Host::Domain(name) => {
                let lookup = tokio::net::lookup_host((name.as_str(), target.port));
                match timeout(DNS_TIMEOUT, lookup).await {
                    Ok(Ok(addrs)) => {
                        for addr in addrs {
                            if let IpAddr::V4(ip) = addr.ip() {
                                if self.route_for(ip) == Route::Direct {
                                    return Route::Direct;
                                }
                            }
                        }
                        Route::Proxy
                    }
                    _ => Route::Proxy,
                }
            }
        }
    }

    fn route_for(&self, ip: Ipv4Addr) -> Route {
        if self.table.read().contains(ip) {
            Route::Direct
        } else {
            Route::Proxy
        }
    }
}
