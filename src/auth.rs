//! Party registration, API-key authentication and rate limiting.
//!
//! A registering party receives its raw key exactly once; only the SHA-256
//! of the key is stored. Requests authenticate through the `X-API-Key`
//! header; a missing, unknown or revoked key is rejected, and role-gated
//! operations additionally require the right role.
//!
//! Registration sits behind a per-client token bucket. The limiter hides
//! behind a small trait so a shared store can replace the in-process bucket
//! when the service scales horizontally; its state is memory-only and
//! resets with the process.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::canonical::now_utc;
use crate::crypto::{generate_api_key, sha256_hex};
use crate::error::{LedgerError, Result};
use crate::storage::JsonDocument;

/// Roles a party can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Lab,
    Auditor,
    Government,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Lab => "lab",
            Role::Auditor => "auditor",
            Role::Government => "government",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| LedgerError::Validation(format!("unknown role '{s}'")))
    }
}

/// A registered party as persisted: the key appears only as its hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub party_id: String,
    pub name: String,
    pub role: Role,
    pub key_hash: String,
    pub created_at: String,
    #[serde(default)]
    pub revoked: bool,
}

/// The public view of a party, with the key hash stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyInfo {
    pub party_id: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
    pub revoked: bool,
}

impl From<&Party> for PartyInfo {
    fn from(party: &Party) -> Self {
        PartyInfo {
            party_id: party.party_id.clone(),
            name: party.name.clone(),
            role: party.role,
            created_at: party.created_at.clone(),
            revoked: party.revoked,
        }
    }
}

/// Registration result; the raw key is never retrievable again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredKey {
    pub party_id: String,
    pub name: String,
    pub role: Role,
    pub api_key: String,
    pub created_at: String,
}

/// Admission port for registration. `check` answers whether `client` may
/// register right now, consuming one token when it may.
pub trait RateLimiter: Send + Sync {
    fn check(&mut self, client: &str) -> bool;
    fn reset(&mut self);
}

/// In-process token bucket, one bucket per client key.
pub struct TokenBucketLimiter {
    capacity: f64,
    window: Duration,
    buckets: HashMap<String, Bucket>,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketLimiter {
    /// `capacity` admissions per rolling `window`.
    pub fn new(capacity: u32, window: Duration) -> Self {
        TokenBucketLimiter {
            capacity: f64::from(capacity),
            window,
            buckets: HashMap::new(),
        }
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn check(&mut self, client: &str) -> bool {
        let now = Instant::now();
        let refill_per_sec = self.capacity / self.window.as_secs_f64();
        let bucket = self.buckets.entry(client.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.buckets.clear();
    }
}

/// Registration window: at most 5 registrations per client per 60 seconds.
pub const REGISTRATION_LIMIT: u32 = 5;
pub const REGISTRATION_WINDOW: Duration = Duration::from_secs(60);

pub struct AuthStore {
    parties: Vec<Party>,
    limiter: Box<dyn RateLimiter>,
    store: JsonDocument,
}

impl AuthStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::with_limiter(
            path,
            Box::new(TokenBucketLimiter::new(
                REGISTRATION_LIMIT,
                REGISTRATION_WINDOW,
            )),
        )
    }

    pub fn with_limiter(
        path: impl AsRef<std::path::Path>,
        limiter: Box<dyn RateLimiter>,
    ) -> Result<Self> {
        let store = JsonDocument::new(path);
        let parties = store.load()?.unwrap_or_default();
        Ok(AuthStore {
            parties,
            limiter,
            store,
        })
    }

    /// Register a party and return its raw key, exactly once.
    pub fn register(&mut self, name: &str, role: Role, client: &str) -> Result<RegisteredKey> {
        if !self.limiter.check(client) {
            return Err(LedgerError::RateLimited(format!(
                "registration limit of {REGISTRATION_LIMIT} per {}s exceeded",
                REGISTRATION_WINDOW.as_secs()
            )));
        }
        if name.trim().is_empty() {
            return Err(LedgerError::Validation("name must not be empty".into()));
        }

        let api_key = generate_api_key();
        let party = Party {
            party_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            role,
            key_hash: sha256_hex(api_key.as_bytes()),
            created_at: now_utc(),
            revoked: false,
        };

        self.parties.push(party.clone());
        if let Err(err) = self.persist() {
            self.parties.pop();
            return Err(err);
        }

        Ok(RegisteredKey {
            party_id: party.party_id,
            name: party.name,
            role: party.role,
            api_key,
            created_at: party.created_at,
        })
    }

    /// Look up the party holding `raw_key`. Unknown and revoked keys are
    /// indistinguishable to the caller.
    pub fn authenticate(&self, raw_key: &str) -> Result<Party> {
        let key_hash = sha256_hex(raw_key.as_bytes());
        self.parties
            .iter()
            .find(|p| p.key_hash == key_hash && !p.revoked)
            .cloned()
            .ok_or_else(|| LedgerError::Auth("invalid API key".into()))
    }

    /// Replace the party's key. The old key stops working the moment the
    /// new hash is stored.
    pub fn rotate(&mut self, party_id: &str) -> Result<String> {
        let index = self.party_index(party_id)?;
        let new_key = generate_api_key();
        let old_hash =
            std::mem::replace(&mut self.parties[index].key_hash, sha256_hex(new_key.as_bytes()));
        if let Err(err) = self.persist() {
            self.parties[index].key_hash = old_hash;
            return Err(err);
        }
        Ok(new_key)
    }

    /// Demo admin operation: revoke the party's key.
    pub fn revoke(&mut self, party_id: &str) -> Result<PartyInfo> {
        let index = self.party_index(party_id)?;
        let was_revoked = self.parties[index].revoked;
        self.parties[index].revoked = true;
        if let Err(err) = self.persist() {
            self.parties[index].revoked = was_revoked;
            return Err(err);
        }
        Ok(PartyInfo::from(&self.parties[index]))
    }

    pub fn parties(&self) -> Vec<PartyInfo> {
        self.parties.iter().map(PartyInfo::from).collect()
    }

    pub fn party(&self, party_id: &str) -> Result<PartyInfo> {
        self.party_index(party_id)
            .map(|i| PartyInfo::from(&self.parties[i]))
    }

    /// Demo: drop every party and all limiter state.
    pub fn reset(&mut self) -> Result<()> {
        let previous = std::mem::take(&mut self.parties);
        if let Err(err) = self.persist() {
            self.parties = previous;
            return Err(err);
        }
        self.limiter.reset();
        Ok(())
    }

    fn party_index(&self, party_id: &str) -> Result<usize> {
        self.parties
            .iter()
            .position(|p| p.party_id == party_id)
            .ok_or_else(|| LedgerError::NotFound(format!("party {party_id} does not exist")))
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.parties)
    }
}

/// Require a specific role, distinguishing "wrong role" from "no key".
pub fn require_role(party: &Party, role: Role) -> Result<()> {
    if party.role == role {
        Ok(())
    } else {
        Err(LedgerError::Role(format!(
            "requires role {}, key belongs to a {}",
            role.as_str(),
            party.role.as_str()
        )))
    }
}
