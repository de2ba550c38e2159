// Copyright (c) 2025 - Cowboy AI, Inc.
//! Identifier Coercion
//!
//! The backend hands resource identifiers back as text, while firewalls and
//! load balancers declare their members by numeric identifier. This module
//! is the one place where that conversion happens.
//!
//! ```text
//! Deferred<String> ──coerce──> Deferred<NodeId>
//!    "101"                        101
//!    "abc"     (Absorb)           0   + Diagnostic::MalformedIdentifier
//!    "abc"     (Strict)           Err(BackendError::MalformedIdentifier)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::warn;

use crate::deferred::Deferred;
use crate::errors::BackendError;

/// Numeric identifier of a provisioned resource
pub type NodeId = u64;

/// Placeholder substituted for an identifier that failed to parse
pub const PLACEHOLDER_ID: NodeId = 0;

/// Identifier parse error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier '{raw}' is not a base-10 integer: {source}")]
    NotNumeric {
        raw: String,
        #[source]
        source: ParseIntError,
    },
}

/// Parse a textual identifier as a non-negative base-10 integer
///
/// Surrounding whitespace is not tolerated; the backend's identifier format
/// never produces it.
///
/// # Examples
///
/// ```rust
/// use cluster_topology::domain::parse_identifier;
///
/// assert_eq!(parse_identifier("101"), Ok(101));
/// assert!(parse_identifier("abc").is_err());
/// assert!(parse_identifier("").is_err());
/// ```
pub fn parse_identifier(text: &str) -> Result<NodeId, IdentifierError> {
    if text.is_empty() {
        return Err(IdentifierError::Empty);
    }

    text.parse::<NodeId>()
        .map_err(|source| IdentifierError::NotNumeric {
            raw: text.to_string(),
            source,
        })
}

/// What to do with an identifier that does not parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionPolicy {
    /// Report a diagnostic and substitute [`PLACEHOLDER_ID`]
    #[default]
    Absorb,
    /// Fail the identifier with [`BackendError::MalformedIdentifier`]
    Strict,
}

impl FromStr for CoercionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "absorb" => Ok(Self::Absorb),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown coercion policy '{other}'")),
        }
    }
}

/// Recoverable condition observed during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An identifier failed to parse and was replaced by a placeholder
    MalformedIdentifier {
        resource: String,
        raw: String,
        reason: String,
        substituted: NodeId,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedIdentifier {
                resource,
                raw,
                reason,
                substituted,
            } => write!(
                f,
                "{resource}: identifier '{raw}' replaced by {substituted} ({reason})"
            ),
        }
    }
}

/// Diagnostic channel shared by the components of one run
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    events: Arc<Mutex<Vec<Diagnostic>>>,
}

impl Diagnostics {
    /// Create an empty channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic
    pub fn record(&self, diagnostic: Diagnostic) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    /// Everything recorded so far, in recording order
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of diagnostics recorded
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Converts deferred textual identifiers into deferred numeric ones
#[derive(Debug, Clone)]
pub struct IdentifierCoercion {
    policy: CoercionPolicy,
    diagnostics: Diagnostics,
}

impl IdentifierCoercion {
    /// Create a coercion layer reporting into `diagnostics`
    pub fn new(policy: CoercionPolicy, diagnostics: Diagnostics) -> Self {
        Self {
            policy,
            diagnostics,
        }
    }

    /// Active policy
    pub fn policy(&self) -> CoercionPolicy {
        self.policy
    }

    /// Coerce a deferred identifier
    ///
    /// The result resolves exactly when `raw` does. Backend failures pass
    /// through untouched; parse failures follow the policy.
    pub fn coerce(&self, resource: &str, raw: &Deferred<String>) -> Deferred<NodeId> {
        let layer = self.clone();
        let resource = resource.to_string();
        raw.try_map(move |text| layer.convert(&resource, &text))
    }

    /// Apply the policy to an already-resolved identifier
    pub fn convert(&self, resource: &str, text: &str) -> Result<NodeId, BackendError> {
        match parse_identifier(text) {
            Ok(id) => Ok(id),
            Err(err) => match self.policy {
                CoercionPolicy::Absorb => {
                    warn!(
                        resource,
                        raw = text,
                        "Malformed identifier, substituting {}: {}",
                        PLACEHOLDER_ID,
                        err
                    );
                    self.diagnostics.record(Diagnostic::MalformedIdentifier {
                        resource: resource.to_string(),
                        raw: text.to_string(),
                        reason: err.to_string(),
                        substituted: PLACEHOLDER_ID,
                    });
                    Ok(PLACEHOLDER_ID)
                }
                CoercionPolicy::Strict => Err(BackendError::MalformedIdentifier {
                    resource: resource.to_string(),
                    raw: text.to_string(),
                }),
            },
        }
    }
}

/// Ordered numeric identifiers of every successfully provisioned node
///
/// Order follows node creation order. Shared by value with each composer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoercedIdentifierSet(Vec<NodeId>);

impl CoercedIdentifierSet {
    /// Create from identifiers in creation order
    pub fn new(ids: Vec<NodeId>) -> Self {
        Self(ids)
    }

    /// Identifiers in creation order
    pub fn as_slice(&self) -> &[NodeId] {
        &self.0
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no members
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Order-independent membership equality
    pub fn same_members(&self, other: &[NodeId]) -> bool {
        let mut mine = self.0.clone();
        let mut theirs = other.to_vec();
        mine.sort_unstable();
        theirs.sort_unstable();
        mine == theirs
    }

    /// Consume into the underlying identifiers
    pub fn into_vec(self) -> Vec<NodeId> {
        self.0
    }
}

impl From<Vec<NodeId>> for CoercedIdentifierSet {
    fn from(ids: Vec<NodeId>) -> Self {
        Self(ids)
    }
}
