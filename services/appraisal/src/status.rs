//! Status classification: raw MLS status tokens to canonical statuses

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{AppraisalError, Result};

/// Canonical listing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalStatus {
    Active,
    Contingent,
    Pending,
    Closed,
}

impl CanonicalStatus {
    pub const ALL: [CanonicalStatus; 4] = [
        CanonicalStatus::Active,
        CanonicalStatus::Contingent,
        CanonicalStatus::Pending,
        CanonicalStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Active => "Active",
            CanonicalStatus::Contingent => "Contingent",
            CanonicalStatus::Pending => "Pending",
            CanonicalStatus::Closed => "Closed",
        }
    }

    /// Parse a canonical name, case-insensitive. "Sold" is accepted for Closed.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "active" => Some(CanonicalStatus::Active),
            "contingent" => Some(CanonicalStatus::Contingent),
            "pending" => Some(CanonicalStatus::Pending),
            "closed" | "sold" => Some(CanonicalStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a token that is in none of the membership lists.
///
/// There is no default: deployments pick one in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "on_unrecognized", rename_all = "snake_case")]
pub enum UnrecognizedPolicy {
    /// Fail with `UnrecognizedStatus`
    Reject,
    /// Map to a fixed canonical status
    Fallback { status: CanonicalStatus },
}

/// Membership lists for one source data dictionary, as loaded from config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyLists {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub active: Vec<String>,
    #[serde(default)]
    pub contingent: Vec<String>,
    #[serde(default)]
    pub pending: Vec<String>,
    #[serde(default)]
    pub closed: Vec<String>,
}

impl TaxonomyLists {
    /// Dictionary of the regional MLS exports the dashboard was built against.
    pub fn mls_v1() -> Self {
        fn owned(tokens: &[&str]) -> Vec<String> {
            tokens.iter().map(|t| t.to_string()).collect()
        }
        Self {
            name: "mls".to_string(),
            version: 1,
            active: owned(&[
                "ACTV", "BOMK", "NEW", "RACT", "PCHG", "TEMP", "AUCT", "PRIV-ACTV", "A", "PR",
                "BOM", "LCS", "ACTIVE", "ACT",
            ]),
            contingent: owned(&[
                "A/I", "CTGA", "CTGO", "HC24", "HC48", "HC72", "HS24", "HS48", "HS72", "HS",
                "SS", "PRIV-CTG", "COBU", "CO3PA", "COSD", "COFR", "COO", "PRE-MARKET", "AUC",
                "FIN",
            ]),
            pending: owned(&["PEND", "PRIV-PEND", "P", "PENDING", "PND"]),
            closed: owned(&["CLSD", "S", "SC", "SOLD", "CLOSED"]),
        }
    }
}

/// A versioned token → status mapping with disjoint membership sets.
#[derive(Debug, Clone, PartialEq)]
pub struct Taxonomy {
    name: String,
    version: u32,
    members: HashMap<String, CanonicalStatus>,
}

impl Taxonomy {
    /// Build from membership lists. Tokens are normalized (trimmed, uppercased);
    /// a token listed under two different statuses is rejected.
    pub fn from_lists(lists: &TaxonomyLists) -> Result<Self> {
        let mut members = HashMap::new();
        let groups = [
            (CanonicalStatus::Active, &lists.active),
            (CanonicalStatus::Contingent, &lists.contingent),
            (CanonicalStatus::Pending, &lists.pending),
            (CanonicalStatus::Closed, &lists.closed),
        ];

        for (status, tokens) in groups {
            for token in tokens {
                let token = normalize_token(token);
                match members.insert(token.clone(), status) {
                    Some(previous) if previous != status => {
                        return Err(AppraisalError::ConflictingTaxonomy {
                            token,
                            first: previous,
                            second: status,
                        });
                    }
                    _ => {}
                }
            }
        }

        Ok(Self {
            name: lists.name.clone(),
            version: lists.version,
            members,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Exact lookup of an already normalized token
    pub fn lookup(&self, token: &str) -> Option<CanonicalStatus> {
        self.members.get(token).copied()
    }

    /// Tokens mapped to `status`, sorted
    pub fn tokens_for(&self, status: CanonicalStatus) -> Vec<&str> {
        let mut tokens: Vec<&str> = self
            .members
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(t, _)| t.as_str())
            .collect();
        tokens.sort_unstable();
        tokens
    }
}

/// Trim and uppercase a raw status token
pub fn normalize_token(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Maps raw status tokens to canonical statuses under a fixed policy.
///
/// Read-only once built; share it by reference.
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    taxonomy: Taxonomy,
    policy: UnrecognizedPolicy,
}

impl StatusClassifier {
    pub fn new(taxonomy: Taxonomy, policy: UnrecognizedPolicy) -> Self {
        Self { taxonomy, policy }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn policy(&self) -> UnrecognizedPolicy {
        self.policy
    }

    pub fn classify(&self, raw_status: &str) -> Result<CanonicalStatus> {
        let token = normalize_token(raw_status);
        if let Some(status) = self.taxonomy.lookup(&token) {
            return Ok(status);
        }
        match self.policy {
            UnrecognizedPolicy::Reject => Err(AppraisalError::UnrecognizedStatus(token)),
            UnrecognizedPolicy::Fallback { status } => Ok(status),
        }
    }
}
