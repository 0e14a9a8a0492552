//! BTPS identities
//!
//! An identity is the atomic addressable unit of the protocol: the string
//! form `account$domain` names an account at a domain that publishes BTPS
//! records in DNS.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// A parsed `account$domain` identity.
///
/// Both halves are guaranteed non-empty and restricted to a conservative
/// label grammar (`[A-Za-z0-9._-]`, with the domain additionally forbidden
/// from starting or ending in `-` or `.`). Invalid identities are a
/// terminal error class; nothing downstream retries them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity {
    account: String,
    domain: String,
}

impl Identity {
    /// Parse an identity from its `account$domain` string form.
    ///
    /// The string must contain exactly one `$` with non-empty,
    /// label-valid halves on each side.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let mut parts = s.splitn(2, '$');
        let account = parts.next().unwrap_or_default();
        let domain = match parts.next() {
            Some(d) => d,
            None => return Err(IdentityError::InvalidFormat(s.to_string())),
        };

        if account.is_empty() || domain.is_empty() || domain.contains('$') {
            return Err(IdentityError::InvalidFormat(s.to_string()));
        }
        if !is_valid_label(account) {
            return Err(IdentityError::InvalidAccount(account.to_string()));
        }
        if !is_valid_domain(domain) {
            return Err(IdentityError::InvalidDomain(domain.to_string()));
        }

        Ok(Self {
            account: account.to_string(),
            domain: domain.to_string(),
        })
    }

    /// The account half (left of `$`).
    pub fn account(&self) -> &str {
        &self.account
    }

    /// The domain half (right of `$`).
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

fn is_valid_label(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

fn is_valid_domain(s: &str) -> bool {
    if !is_valid_label(s) {
        return false;
    }
    let first = s.chars().next();
    let last = s.chars().last();
    !matches!(first, Some('-') | Some('.')) && !matches!(last, Some('-') | Some('.'))
}

impl Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}${}", self.account, self.domain)
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.to_string()
    }
}
