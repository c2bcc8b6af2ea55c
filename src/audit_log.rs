//! Append-only hash-chained audit log.
//!
//! Each event is cryptographically linked to the previous one: the event's
//! hash covers its own fields plus the predecessor's hash, so any mutation
//! of a stored event breaks verification at exactly that point. The log is
//! never updated or deleted in normal operation; `tamper` and `reset` exist
//! only so the detection machinery can be demonstrated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonical::now_utc;
use crate::crypto::{chain_hash, ZERO_HASH};
use crate::error::{LedgerError, Result};
use crate::storage::JsonDocument;

/// Lifecycle events a lab reports to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TrainingStarted,
    TrainingCompleted,
    SafetyEvalRun,
    SafetyEvalPassed,
    SafetyEvalFailed,
    ModelDeployed,
    IncidentReported,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TrainingStarted => "training_started",
            EventType::TrainingCompleted => "training_completed",
            EventType::SafetyEvalRun => "safety_eval_run",
            EventType::SafetyEvalPassed => "safety_eval_passed",
            EventType::SafetyEvalFailed => "safety_eval_failed",
            EventType::ModelDeployed => "model_deployed",
            EventType::IncidentReported => "incident_reported",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| LedgerError::Validation(format!("unknown event_type '{s}'")))
    }
}

/// A single entry in the audit log.
///
/// `hash` covers every other field (including `previous_hash`), computed as
/// a chain hash so the entry is bound to its predecessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Sequential id, assigned from 0.
    pub id: u64,
    pub event_type: EventType,
    pub description: String,
    /// Arbitrary structured context supplied by the reporter.
    pub metadata: Map<String, Value>,
    pub timestamp: String,
    /// Predecessor's hash; 64 zeros for the genesis event.
    pub previous_hash: String,
    pub hash: String,
}

/// Hash input: every event field except the hash itself. Field order is
/// irrelevant, canonical serialization sorts keys.
#[derive(Serialize)]
struct EventBody<'a> {
    id: u64,
    event_type: EventType,
    description: &'a str,
    metadata: &'a Map<String, Value>,
    timestamp: &'a str,
    previous_hash: &'a str,
}

impl Event {
    /// Recompute this event's hash from its stored fields.
    pub fn compute_hash(&self) -> Result<String> {
        chain_hash(
            &EventBody {
                id: self.id,
                event_type: self.event_type,
                description: &self.description,
                metadata: &self.metadata,
                timestamp: &self.timestamp,
                previous_hash: &self.previous_hash,
            },
            &self.previous_hash,
        )
    }
}

/// Outcome of a full chain verification.
///
/// A broken chain is data about the ledger, not a process error: callers
/// receive the earliest invalid id and a reason and decide what to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerification {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_invalid_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ChainVerification {
    fn valid() -> Self {
        ChainVerification {
            valid: true,
            first_invalid_id: None,
            reason: None,
        }
    }

    fn invalid(id: u64, reason: impl Into<String>) -> Self {
        ChainVerification {
            valid: false,
            first_invalid_id: Some(id),
            reason: Some(reason.into()),
        }
    }
}

/// The append-only event log with file persistence.
pub struct AuditLog {
    events: Vec<Event>,
    store: JsonDocument,
}

impl AuditLog {
    /// Open the log at `path`, restoring any previously persisted events
    /// ordered by id.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let store = JsonDocument::new(path);
        let mut events: Vec<Event> = store.load()?.unwrap_or_default();
        events.sort_by_key(|e| e.id);
        Ok(AuditLog { events, store })
    }

    /// Append a new event, persist, and return it.
    ///
    /// If the write fails the in-memory state is rolled back to the
    /// pre-append snapshot and a persistence error is returned.
    pub fn append(
        &mut self,
        event_type: EventType,
        description: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Result<Event> {
        let previous_hash = self
            .events
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| ZERO_HASH.to_string());

        let mut event = Event {
            id: self.events.len() as u64,
            event_type,
            description: description.into(),
            metadata,
            timestamp: now_utc(),
            previous_hash,
            hash: String::new(),
        };
        event.hash = event.compute_hash()?;

        self.events.push(event.clone());
        if let Err(err) = self.persist() {
            self.events.pop();
            tracing::warn!(error = %err, "audit append rolled back: persistence failed");
            return Err(err);
        }
        Ok(event)
    }

    /// Events filtered by type, head-limited.
    pub fn list(&self, event_type: Option<EventType>, limit: Option<usize>) -> Vec<Event> {
        let filtered = self
            .events
            .iter()
            .filter(|e| event_type.map_or(true, |t| e.event_type == t));
        match limit {
            Some(n) => filtered.take(n).cloned().collect(),
            None => filtered.cloned().collect(),
        }
    }

    pub fn get(&self, id: u64) -> Result<&Event> {
        self.events
            .get(id as usize)
            .ok_or_else(|| LedgerError::NotFound(format!("event {id} does not exist")))
    }

    /// Walk the chain and report the earliest broken link, if any.
    pub fn verify_chain(&self) -> Result<ChainVerification> {
        for (i, event) in self.events.iter().enumerate() {
            let expected_previous = if i == 0 {
                ZERO_HASH.to_string()
            } else {
                self.events[i - 1].hash.clone()
            };
            if event.previous_hash != expected_previous {
                let reason = if i == 0 {
                    "genesis previous_hash is not all zeros".to_string()
                } else {
                    format!("previous_hash does not match the hash of event {}", i - 1)
                };
                return Ok(ChainVerification::invalid(event.id, reason));
            }
            if event.compute_hash()? != event.hash {
                return Ok(ChainVerification::invalid(
                    event.id,
                    "stored hash does not match recomputed hash",
                ));
            }
        }
        Ok(ChainVerification::valid())
    }

    /// Demo only: empty the log.
    pub fn reset(&mut self) -> Result<()> {
        let snapshot = std::mem::take(&mut self.events);
        if let Err(err) = self.persist() {
            self.events = snapshot;
            return Err(err);
        }
        Ok(())
    }

    /// Demo only: overwrite a stored field WITHOUT recomputing the hash,
    /// so that `verify_chain` can demonstrate detection.
    pub fn tamper(&mut self, id: u64, field: &str, new_value: Value) -> Result<Event> {
        let index = id as usize;
        if index >= self.events.len() {
            return Err(LedgerError::NotFound(format!("event {id} does not exist")));
        }

        let snapshot = self.events[index].clone();
        {
            let event = &mut self.events[index];
            match field {
                "description" => event.description = value_as_string(&new_value),
                "timestamp" => event.timestamp = value_as_string(&new_value),
                "previous_hash" => event.previous_hash = value_as_string(&new_value),
                "hash" => event.hash = value_as_string(&new_value),
                "event_type" => {
                    event.event_type = EventType::parse(&value_as_string(&new_value))?;
                }
                "metadata" => match new_value {
                    Value::Object(map) => event.metadata = map,
                    _ => {
                        return Err(LedgerError::Validation(
                            "metadata must be a JSON object".to_string(),
                        ))
                    }
                },
                other => {
                    return Err(LedgerError::Validation(format!(
                        "unknown tamperable field '{other}'"
                    )))
                }
            }
        }

        if let Err(err) = self.persist() {
            self.events[index] = snapshot;
            return Err(err);
        }
        Ok(self.events[index].clone())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Ordered event hashes, the Merkle tree's leaves.
    pub fn event_hashes(&self) -> Vec<String> {
        self.events.iter().map(|e| e.hash.clone()).collect()
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.events.last().map(|e| e.hash.as_str())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.events)
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
