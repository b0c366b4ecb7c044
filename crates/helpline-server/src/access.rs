//! Network access filter for student-facing routes.
//!
//! A caller is allowed when its address falls inside one of the configured
//! CIDR ranges. Otherwise its reverse-DNS names are checked against a trusted
//! suffix, so on-campus hosts outside the listed ranges still get in.

use std::net::IpAddr;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use ipnet::IpNet;

use crate::config::{AccessConfig, ConfigError};

/// Parse `"137.82.0.0/16"` or `"2607:f8f0::/32"`.
///
/// Host bits in the address are masked off.
pub fn parse_range(text: &str) -> Result<IpNet, ConfigError> {
    text.trim()
        .parse::<IpNet>()
        .map(|net| net.trunc())
        .map_err(|_| ConfigError::Invalid(format!("bad CIDR range {text:?}")))
}

/// Reverse-DNS lookup seam.
#[async_trait]
pub trait ReverseResolver: Send + Sync + 'static {
    /// PTR names for `ip`. Lookup failures yield an empty list.
    async fn reverse_names(&self, ip: IpAddr) -> Vec<String>;
}

/// Resolver that never finds a name; the filter is then CIDR-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReverseLookup;

#[async_trait]
impl ReverseResolver for NoReverseLookup {
    async fn reverse_names(&self, _ip: IpAddr) -> Vec<String> {
        Vec::new()
    }
}

/// PTR lookups through the host's configured name servers.
pub struct SystemReverseLookup {
    resolver: TokioAsyncResolver,
}

impl SystemReverseLookup {
    /// Build from the system resolver configuration (`/etc/resolv.conf` on Unix).
    pub fn from_system_conf() -> Result<Self, ConfigError> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| ConfigError::Invalid(format!("system resolver: {e}")))?;
        Ok(Self { resolver })
    }
}

#[async_trait]
impl ReverseResolver for SystemReverseLookup {
    async fn reverse_names(&self, ip: IpAddr) -> Vec<String> {
        match self.resolver.reverse_lookup(ip).await {
            Ok(lookup) => lookup.iter().map(ToString::to_string).collect(),
            Err(e) => {
                tracing::debug!("Reverse lookup for {} failed: {}", ip, e);
                Vec::new()
            },
        }
    }
}

impl std::fmt::Debug for SystemReverseLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemReverseLookup").finish_non_exhaustive()
    }
}

/// Decides whether a caller may use student-facing routes.
pub struct AccessFilter {
    ranges: Vec<IpNet>,
    trusted_suffix: Option<String>,
    resolver: Box<dyn ReverseResolver>,
}

impl AccessFilter {
    /// Build a filter from its config section.
    pub fn from_config(
        config: &AccessConfig,
        resolver: impl ReverseResolver,
    ) -> Result<Self, ConfigError> {
        let ranges = config
            .allowed_ranges
            .iter()
            .map(String::as_str)
            .map(parse_range)
            .collect::<Result<Vec<_>, _>>()?;

        let trusted_suffix = config
            .trusted_suffix
            .as_deref()
            .map(normalize_name)
            .filter(|suffix| !suffix.is_empty());

        Ok(Self { ranges, trusted_suffix, resolver: Box::new(resolver) })
    }

    /// Whether `ip` is allowed.
    pub async fn is_authorized(&self, ip: IpAddr) -> bool {
        if self.ranges.iter().any(|range| range.contains(&ip)) {
            return true;
        }

        let Some(suffix) = &self.trusted_suffix else {
            return false;
        };

        let allowed = self
            .resolver
            .reverse_names(ip)
            .await
            .iter()
            .any(|name| normalize_name(name).ends_with(suffix.as_str()));

        if !allowed {
            tracing::debug!("Rejected {} by access filter", ip);
        }
        allowed
    }
}

impl std::fmt::Debug for AccessFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessFilter")
            .field("range_count", &self.ranges.len())
            .field("trusted_suffix", &self.trusted_suffix)
            .finish_non_exhaustive()
    }
}

/// Lowercase and drop one trailing dot.
fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}
