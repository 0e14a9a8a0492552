//! Peer address normalization
//!
//! Peers are addressed as `host`, `host:port`, or `btps://host[:port]`.
//! The default port when none is named is [`btps_core::DEFAULT_PORT`].

use std::fmt;

use btps_core::DEFAULT_PORT;

use crate::error::{ResolverError, ResolverResult};

/// A normalized host and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressParts {
    pub host: String,
    pub port: u16,
}

impl AddressParts {
    /// Normalize a peer address.
    ///
    /// Accepts a bare `host`, `host:port`, `btps://host[:port]`, and
    /// bracketed IPv6 forms like `[::1]:3443`. Any other URL scheme is a
    /// terminal [`ResolverError::UnsupportedProtocol`].
    pub fn parse(input: &str) -> ResolverResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ResolverError::InvalidHostname(input.to_string()));
        }

        let rest = if let Some(stripped) = input.strip_prefix("btps://") {
            stripped
        } else if let Some(scheme_end) = input.find("://") {
            return Err(ResolverError::UnsupportedProtocol(
                input[..scheme_end].to_string(),
            ));
        } else {
            input
        };

        // Strip any path component a URL form may carry.
        let rest = rest.split('/').next().unwrap_or_default();
        if rest.is_empty() {
            return Err(ResolverError::InvalidHostname(input.to_string()));
        }

        let (host, port) = split_host_port(rest)
            .ok_or_else(|| ResolverError::InvalidHostname(input.to_string()))?;

        let port = match port {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| ResolverError::InvalidHostname(input.to_string()))?,
            None => DEFAULT_PORT,
        };

        if host.is_empty() {
            return Err(ResolverError::InvalidHostname(input.to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// Split `host[:port]`, keeping bracketed IPv6 literals intact.
fn split_host_port(s: &str) -> Option<(&str, Option<&str>)> {
    if let Some(rest) = s.strip_prefix('[') {
        // [v6-literal] or [v6-literal]:port
        let close = rest.find(']')?;
        let host = &rest[..close];
        match &rest[close + 1..] {
            "" => Some((host, None)),
            tail => Some((host, Some(tail.strip_prefix(':')?))),
        }
    } else if s.matches(':').count() > 1 {
        // Unbracketed IPv6 literal, no port.
        Some((s, None))
    } else {
        match s.split_once(':') {
            Some((host, port)) => Some((host, Some(port))),
            None => Some((s, None)),
        }
    }
}

impl fmt::Display for AddressParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
