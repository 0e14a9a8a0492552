//! BTPS record resolution over DNS TXT
//!
//! Record grammar: the character-strings of every TXT record in the
//! answer are concatenated, the result is split on `;`, each piece is
//! trimmed and split on the first `=`. Key/value pairs outside the known
//! set are ignored for forward compatibility.

use std::collections::HashMap;

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use tracing::debug;

use btps_core::{Identity, PROTOCOL_VERSION};

use crate::address::AddressParts;
use crate::error::{ResolverError, ResolverResult};

/// DNS label prefix reserved for BTPS records.
pub const DNS_NAMESPACE: &str = "_btps";

/// The result of resolving a domain's host record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    /// Where the domain accepts BTPS traffic.
    pub address: AddressParts,
    /// The currently active key selector for the domain.
    pub selector: String,
}

/// The result of resolving an account's key record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// Key type label from the record (`k`), e.g. `rsa`.
    pub key_type: String,
    /// The public key as PEM, re-armored from the record's base64 body.
    pub pem: String,
    /// Protocol version the record was published for (`v`).
    pub version: String,
}

/// Which part of a key record a caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPart {
    Key,
    Pem,
    Version,
}

impl KeyRecord {
    /// Select one part of the record by name.
    pub fn part(&self, part: KeyPart) -> &str {
        match part {
            KeyPart::Key => &self.key_type,
            KeyPart::Pem => &self.pem,
            KeyPart::Version => &self.version,
        }
    }
}

/// The seam between the connector and DNS.
///
/// Production code uses [`DnsResolver`]; tests use [`StaticResolver`]
/// with a fixed record table.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `_btps.<domain>` to the domain's host record.
    async fn resolve_host(&self, domain: &str) -> ResolverResult<HostRecord>;

    /// Resolve `<selector>._btps.<account>.<domain>` to a key record.
    async fn resolve_key(&self, identity: &Identity, selector: &str) -> ResolverResult<KeyRecord>;
}

/// Build the TXT name for a domain's host record.
pub fn host_record_name(domain: &str) -> String {
    format!("{}.{}", DNS_NAMESPACE, domain)
}

/// Build the TXT name for an account's key record.
pub fn key_record_name(identity: &Identity, selector: &str) -> String {
    format!(
        "{}.{}.{}.{}",
        selector,
        DNS_NAMESPACE,
        identity.account(),
        identity.domain()
    )
}

/// Parse the concatenated TXT character-strings into key/value pairs.
fn parse_txt_pairs(joined: &str) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    for piece in joined.split(';') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if let Some((key, value)) = piece.split_once('=') {
            pairs.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    pairs
}

fn require<'a>(
    pairs: &'a HashMap<String, String>,
    name: &str,
    field: &str,
) -> ResolverResult<&'a str> {
    pairs
        .get(field)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ResolverError::MissingConfiguration {
            name: name.to_string(),
            field: field.to_string(),
        })
}

fn check_version(pairs: &HashMap<String, String>, name: &str) -> ResolverResult<String> {
    let version = require(pairs, name, "v")?;
    if version != PROTOCOL_VERSION {
        return Err(ResolverError::UnsupportedProtocolVersion {
            name: name.to_string(),
            expected: PROTOCOL_VERSION.to_string(),
            actual: version.to_string(),
        });
    }
    Ok(version.to_string())
}

/// Interpret host-record pairs. Shared by the production resolver and
/// the static test double so both enforce identical rules.
pub fn host_record_from_pairs(name: &str, joined: &str) -> ResolverResult<HostRecord> {
    let pairs = parse_txt_pairs(joined);
    check_version(&pairs, name)?;
    let host = require(&pairs, name, "u")?;
    let selector = require(&pairs, name, "s")?;
    Ok(HostRecord {
        address: AddressParts::parse(host)?,
        selector: selector.to_string(),
    })
}

/// Interpret key-record pairs, re-armoring the base64 body into PEM.
pub fn key_record_from_pairs(name: &str, joined: &str) -> ResolverResult<KeyRecord> {
    let pairs = parse_txt_pairs(joined);
    let version = check_version(&pairs, name)?;
    let key_type = require(&pairs, name, "k")?.to_string();
    let body = require(&pairs, name, "p")?;
    Ok(KeyRecord {
        key_type,
        pem: rewrap_pem(body),
        version,
    })
}

/// Re-wrap a headerless base64 key body into SPKI PEM armor with
/// 64-character lines.
fn rewrap_pem(body: &str) -> String {
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pem = String::with_capacity(compact.len() + 64);
    pem.push_str("-----BEGIN PUBLIC KEY-----\n");
    for chunk in compact.as_bytes().chunks(64) {
        // The record body is ASCII base64; chunk boundaries are safe.
        pem.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}

/// Production resolver backed by hickory-resolver.
pub struct DnsResolver {
    inner: TokioAsyncResolver,
}

impl DnsResolver {
    /// Resolver using the system's configured nameservers.
    pub fn from_system_conf() -> ResolverResult<Self> {
        let inner = TokioAsyncResolver::tokio_from_system_conf().map_err(|e| {
            ResolverError::DnsLookupFailed {
                name: "system resolver".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { inner })
    }

    /// Resolver using public default nameservers.
    pub fn new() -> Self {
        Self {
            inner: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }

    async fn lookup_joined(&self, name: &str) -> ResolverResult<String> {
        let lookup =
            self.inner
                .txt_lookup(name.to_string())
                .await
                .map_err(|e| ResolverError::DnsLookupFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;

        let mut joined = String::new();
        for record in lookup.iter() {
            for data in record.txt_data() {
                joined.push_str(&String::from_utf8_lossy(data));
            }
        }
        debug!(name = %name, bytes = joined.len(), "Resolved TXT record");
        Ok(joined)
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostResolver for DnsResolver {
    async fn resolve_host(&self, domain: &str) -> ResolverResult<HostRecord> {
        let name = host_record_name(domain);
        let joined = self.lookup_joined(&name).await?;
        host_record_from_pairs(&name, &joined)
    }

    async fn resolve_key(&self, identity: &Identity, selector: &str) -> ResolverResult<KeyRecord> {
        let name = key_record_name(identity, selector);
        let joined = self.lookup_joined(&name).await?;
        key_record_from_pairs(&name, &joined)
    }
}

/// In-memory resolver for tests: a fixed table of TXT bodies keyed by
/// record name.
#[derive(Debug, Default)]
pub struct StaticResolver {
    records: HashMap<String, String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw TXT body for a record name.
    pub fn with_record(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.records.insert(name.into(), body.into());
        self
    }

    /// Register a host record for a domain.
    pub fn with_host(self, domain: &str, host: &str, selector: &str) -> Self {
        let body = format!("v={}; u={}; s={}", PROTOCOL_VERSION, host, selector);
        self.with_record(host_record_name(domain), body)
    }

    /// Register a key record for an identity, from a full PEM.
    pub fn with_key(self, identity: &Identity, selector: &str, pem: &str) -> Self {
        let body: String = pem
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .collect::<Vec<_>>()
            .join("");
        let record = format!("v={}; k=rsa; p={}", PROTOCOL_VERSION, body);
        self.with_record(key_record_name(identity, selector), record)
    }

    fn get(&self, name: &str) -> ResolverResult<&str> {
        self.records
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ResolverError::DnsLookupFailed {
                name: name.to_string(),
                reason: "no such record".to_string(),
            })
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve_host(&self, domain: &str) -> ResolverResult<HostRecord> {
        let name = host_record_name(domain);
        host_record_from_pairs(&name, self.get(&name)?)
    }

    async fn resolve_key(&self, identity: &Identity, selector: &str) -> ResolverResult<KeyRecord> {
        let name = key_record_name(identity, selector);
        key_record_from_pairs(&name, self.get(&name)?)
    }
}
