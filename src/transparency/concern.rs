//! Concern, response and resolution records.
//!
//! A concern is raised against an anonymous identifier and walks a small
//! state machine:
//!
//! ```text
//! open --[response]--> responded --[dispute]--> disputed
//! {open | responded | disputed} --[resolution]--> resolved   (terminal)
//! ```
//!
//! The transitions themselves are enforced by the store; these types carry
//! the data and the status predicates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcernStatus {
    Open,
    Responded,
    Disputed,
    Resolved,
}

impl ConcernStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcernStatus::Open => "open",
            ConcernStatus::Responded => "responded",
            ConcernStatus::Disputed => "disputed",
            ConcernStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| LedgerError::Validation(format!("unknown concern status '{s}'")))
    }
}

/// Who answered a concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderRole {
    Lab,
    Auditor,
}

impl ResponderRole {
    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| LedgerError::Validation(format!("unknown responder role '{s}'")))
    }
}

/// Auditor verdict on a concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Accepted,
    Rejected,
    NeedsMoreInfo,
}

impl ResolutionOutcome {
    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| LedgerError::Validation(format!("unknown resolution outcome '{s}'")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concern {
    pub id: String,
    /// `anon_<12-hex>`; the identity and salt behind it never reach the
    /// server.
    pub anon_id: String,
    pub title: String,
    pub description: String,
    /// Free text naming what the concern is about, typically a deployment
    /// id or a submission id.
    pub target: String,
    pub status: ConcernStatus,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl Concern {
    pub fn is_resolved(&self) -> bool {
        self.status == ConcernStatus::Resolved
    }

    /// Open, responded and disputed concerns all block a deployment.
    pub fn is_unresolved(&self) -> bool {
        !self.is_resolved()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub concern_id: String,
    pub responder_role: ResponderRole,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub id: String,
    pub concern_id: String,
    pub auditor_id: String,
    pub outcome: ResolutionOutcome,
    pub notes: String,
    pub created_at: String,
}
