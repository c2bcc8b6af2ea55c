//! # Frontier Ledger - Tamper-Evident AI Deployment Transparency
//!
//! A transparency ledger coordinating three roles around AI-deployment
//! compliance: labs file submissions against required templates, anyone can
//! raise a concern under an anonymous identifier, an auditor verifies
//! submissions and resolves concerns, and a deployment gate clears a
//! release only when every required template is verified and every concern
//! resolved.
//!
//! ## Core Philosophy
//!
//! **"Not unhackable, but tamper-evident with cryptographic proof."**
//!
//! - Records may be altered by whoever holds the disk, but not silently
//! - Every event is chained to its predecessor by hash
//! - Inclusion in the ledger is provable with a Merkle proof
//! - Cross-party agreement is checked by comparing content hashes
//!
//! ## Components
//!
//! - [`audit_log`] - append-only hash-chained event log
//! - [`merkle`] - inclusion proofs over the event hashes
//! - [`transparency`] - concerns, compliance submissions, deployment gate
//! - [`zk`] - commit-open threshold proofs over committed counts
//! - [`mirror`] - per-party snapshots and divergence detection
//! - [`auth`] - API-key registration, rotation, rate limiting
//! - [`api`] - the REST surface tying the components together
//!
//! ## Example
//!
//! ```rust
//! use frontier_ledger::audit_log::{AuditLog, EventType};
//! use frontier_ledger::merkle::MerkleTree;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut log = AuditLog::open(dir.path().join("audit_log.json")).unwrap();
//! log.append(EventType::SafetyEvalRun, "eval executed", Default::default())
//!     .unwrap();
//!
//! assert!(log.verify_chain().unwrap().valid);
//!
//! let tree = MerkleTree::from_leaves(log.event_hashes());
//! let proof = tree.prove(0).unwrap();
//! assert!(MerkleTree::verify(
//!     &log.events()[0].hash,
//!     &proof,
//!     tree.root().unwrap(),
//! ));
//! ```
//!
//! ## Security Model
//!
//! Protected against: silent record edits, log truncation and reordering,
//! forged inclusion claims, replayed API keys after rotation.
//!
//! NOT protected against: an attacker with full control of the host, a
//! committer who also operates the ledger (the threshold-proof scheme keeps
//! its witness server-side; see [`zk`]), or network-level tampering -
//! transport security terminates elsewhere.

pub mod api;
pub mod audit_log;
pub mod auth;
pub mod canonical;
pub mod config;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod mirror;
pub mod storage;
pub mod transparency;
pub mod zk;

pub use audit_log::{AuditLog, ChainVerification, Event, EventType};
pub use auth::{AuthStore, Party, PartyInfo, RateLimiter, RegisteredKey, Role, TokenBucketLimiter};
pub use canonical::{now_utc, to_canonical_json};
pub use crypto::{anonymous_id, chain_hash, canonical_hash, node_hash, sha256_hex, ZERO_HASH};
pub use error::{LedgerError, Result};
pub use merkle::{MerkleTree, Position, ProofStep};
pub use mirror::{MirrorParty, MirrorSimulator, MirrorSnapshot};
pub use transparency::{
    ComplianceSubmission, Concern, ConcernStatus, DeploymentComplianceStatus, Resolution,
    ResolutionOutcome, ResponderRole, Response, ReviewDecision, SubmissionStatus, TemplateType,
    TransparencyStore,
};
pub use zk::{ZkCommitment, ZkEngine, ZkProof, ZkVerification};

/// Version of the ledger crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
