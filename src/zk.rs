//! Commit-open threshold proofs over committed counts.
//!
//! A party commits to a count (e.g. "safety evals run this quarter") with a
//! blinded hash commitment, then later demonstrates `count >= threshold`
//! without publishing the count in the clear.
//!
//! This is an auditor-trust-in-the-ledger scheme, not a succinct
//! non-interactive ZK proof: the verifier recomputes the proof from the
//! witness the engine retained at commitment time, so soundness holds only
//! against a committer who does not control the ledger. A faithful
//! deployment keeps the witness client-side and substitutes a sound range
//! proof system; the `commit`/`prove`/`verify` interface is what carries
//! over.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::canonical::now_utc;
use crate::crypto::{generate_blinding, sha256_hex};
use crate::error::{LedgerError, Result};
use crate::storage::JsonDocument;

/// Public half of a commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZkCommitment {
    pub id: String,
    /// `SHA256(str(count) || ":" || blinding)`, lowercase hex.
    pub commitment: String,
    pub created_at: String,
    pub metadata: Value,
}

/// The opening retained server-side for later proof requests (demo
/// behavior; production keeps this client-side).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Witness {
    count: u64,
    blinding: String,
}

/// A threshold proof bound to a commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZkProof {
    pub commitment_id: String,
    pub threshold: u64,
    /// `SHA256(commitment || ":" || threshold || ":" || count || ":" || blinding)`.
    pub proof_value: String,
    pub claim: String,
    pub created_at: String,
}

/// Verifier verdict, returned as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZkVerification {
    pub commitment_id: String,
    pub threshold: u64,
    pub valid: bool,
    pub claim: String,
}

/// A freshly issued commitment together with its blinding factor, which is
/// returned to the caller exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCommitment {
    #[serde(flatten)]
    pub commitment: ZkCommitment,
    pub blinding: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ZkState {
    commitments: Vec<ZkCommitment>,
    witnesses: HashMap<String, Witness>,
    proofs: Vec<ZkProof>,
}

pub struct ZkEngine {
    state: ZkState,
    store: JsonDocument,
}

fn commitment_value(count: u64, blinding: &str) -> String {
    sha256_hex(format!("{count}:{blinding}").as_bytes())
}

fn proof_value(commitment: &str, threshold: u64, count: u64, blinding: &str) -> String {
    sha256_hex(format!("{commitment}:{threshold}:{count}:{blinding}").as_bytes())
}

fn threshold_claim(threshold: u64) -> String {
    format!("count >= {threshold}")
}

impl ZkEngine {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let store = JsonDocument::new(path);
        let state = store.load()?.unwrap_or_default();
        Ok(ZkEngine { state, store })
    }

    /// Create a commitment to `count`. The blinding factor is generated
    /// when the caller does not supply one, and is part of the response
    /// only at creation time.
    pub fn commit(
        &mut self,
        count: u64,
        blinding: Option<String>,
        metadata: Value,
    ) -> Result<IssuedCommitment> {
        if let Some(b) = &blinding {
            if b.is_empty() {
                return Err(LedgerError::Validation(
                    "blinding must not be empty when supplied".into(),
                ));
            }
        }
        let blinding = blinding.unwrap_or_else(generate_blinding);

        let commitment = ZkCommitment {
            id: Uuid::new_v4().to_string(),
            commitment: commitment_value(count, &blinding),
            created_at: now_utc(),
            metadata,
        };

        self.state.commitments.push(commitment.clone());
        self.state
            .witnesses
            .insert(commitment.id.clone(), Witness { count, blinding: blinding.clone() });
        if let Err(err) = self.persist() {
            self.state.commitments.pop();
            self.state.witnesses.remove(&commitment.id);
            return Err(err);
        }

        Ok(IssuedCommitment {
            commitment,
            blinding,
        })
    }

    pub fn commitment(&self, id: &str) -> Result<&ZkCommitment> {
        self.state
            .commitments
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("commitment {id} does not exist")))
    }

    /// Produce a threshold proof for an existing commitment.
    ///
    /// Fails with a precondition error when the committed count is below
    /// the threshold: the claim would be false, so no proof exists.
    pub fn prove(&mut self, commitment_id: &str, threshold: u64) -> Result<ZkProof> {
        let commitment = self.commitment(commitment_id)?.commitment.clone();
        let witness = self
            .state
            .witnesses
            .get(commitment_id)
            .ok_or_else(|| {
                LedgerError::NotFound(format!("no witness retained for commitment {commitment_id}"))
            })?
            .clone();

        if witness.count < threshold {
            return Err(LedgerError::Precondition(format!(
                "committed count is below the requested threshold {threshold}"
            )));
        }

        let proof = ZkProof {
            commitment_id: commitment_id.to_string(),
            threshold,
            proof_value: proof_value(&commitment, threshold, witness.count, &witness.blinding),
            claim: threshold_claim(threshold),
            created_at: now_utc(),
        };

        self.state.proofs.push(proof.clone());
        if let Err(err) = self.persist() {
            self.state.proofs.pop();
            return Err(err);
        }
        Ok(proof)
    }

    /// Check a claimed proof value against the stored witness.
    pub fn verify(
        &self,
        commitment_id: &str,
        threshold: u64,
        claimed_proof_value: &str,
    ) -> Result<ZkVerification> {
        let commitment = self.commitment(commitment_id)?;
        let witness = self.state.witnesses.get(commitment_id).ok_or_else(|| {
            LedgerError::NotFound(format!("no witness retained for commitment {commitment_id}"))
        })?;

        let expected = proof_value(
            &commitment.commitment,
            threshold,
            witness.count,
            &witness.blinding,
        );
        Ok(ZkVerification {
            commitment_id: commitment_id.to_string(),
            threshold,
            valid: expected == claimed_proof_value && witness.count >= threshold,
            claim: threshold_claim(threshold),
        })
    }

    pub fn commitments(&self) -> &[ZkCommitment] {
        &self.state.commitments
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn open_engine() -> (tempfile::TempDir, ZkEngine) {
        let dir = tempdir().unwrap();
        let engine = ZkEngine::open(dir.path().join("zk_store.json")).unwrap();
        (dir, engine)
    }

    #[test]
    fn test_commit_returns_blinding_once() {
        let (_dir, mut engine) = open_engine();
        let issued = engine.commit(7, None, json!({"metric": "evals"})).unwrap();
        assert_eq!(issued.blinding.len(), 64);
        assert_eq!(
            issued.commitment.commitment,
            commitment_value(7, &issued.blinding)
        );
        // The public view has no blinding.
        let public = engine.commitment(&issued.commitment.id).unwrap();
        assert_eq!(public.commitment, issued.commitment.commitment);
    }

    #[test]
    fn test_commit_with_caller_blinding_is_deterministic() {
        let (_dir, mut engine) = open_engine();
        let blinding = "ab".repeat(32);
        let issued = engine
            .commit(12, Some(blinding.clone()), Value::Null)
            .unwrap();
        assert_eq!(issued.commitment.commitment, commitment_value(12, &blinding));
    }

    #[test]
    fn test_prove_and_verify_above_threshold() {
        let (_dir, mut engine) = open_engine();
        let issued = engine.commit(7, None, Value::Null).unwrap();
        let proof = engine.prove(&issued.commitment.id, 5).unwrap();
        assert_eq!(proof.claim, "count >= 5");

        let verdict = engine
            .verify(&issued.commitment.id, 5, &proof.proof_value)
            .unwrap();
        assert!(verdict.valid);
    }

    #[test]
    fn test_prove_below_threshold_is_precondition() {
        let (_dir, mut engine) = open_engine();
        let issued = engine.commit(3, None, Value::Null).unwrap();
        let err = engine.prove(&issued.commitment.id, 5).unwrap_err();
        assert_eq!(err.kind(), "precondition");
    }

    #[test]
    fn test_exact_threshold_proves() {
        let (_dir, mut engine) = open_engine();
        let issued = engine.commit(5, None, Value::Null).unwrap();
        let proof = engine.prove(&issued.commitment.id, 5).unwrap();
        assert!(engine
            .verify(&issued.commitment.id, 5, &proof.proof_value)
            .unwrap()
            .valid);
    }

    #[test]
    fn test_forged_proof_value_fails() {
        let (_dir, mut engine) = open_engine();
        let issued = engine.commit(9, None, Value::Null).unwrap();
        engine.prove(&issued.commitment.id, 4).unwrap();
        let verdict = engine
            .verify(&issued.commitment.id, 4, &sha256_hex(b"forged"))
            .unwrap();
        assert!(!verdict.valid);
    }

    #[test]
    fn test_proof_bound_to_threshold() {
        let (_dir, mut engine) = open_engine();
        let issued = engine.commit(9, None, Value::Null).unwrap();
        let proof = engine.prove(&issued.commitment.id, 4).unwrap();
        // Replaying the proof for a different threshold fails.
        let verdict = engine
            .verify(&issued.commitment.id, 2, &proof.proof_value)
            .unwrap();
        assert!(!verdict.valid);
    }

    #[test]
    fn test_unknown_commitment_not_found() {
        let (_dir, mut engine) = open_engine();
        assert_eq!(engine.prove("missing", 1).unwrap_err().kind(), "not_found");
        assert_eq!(
            engine.verify("missing", 1, "x").unwrap_err().kind(),
            "not_found"
        );
    }

    #[test]
    fn test_witness_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zk_store.json");
        let commitment_id;
        {
            let mut engine = ZkEngine::open(&path).unwrap();
            commitment_id = engine.commit(7, None, Value::Null).unwrap().commitment.id;
        }
        let mut engine = ZkEngine::open(&path).unwrap();
        let proof = engine.prove(&commitment_id, 6).unwrap();
        assert!(engine
            .verify(&commitment_id, 6, &proof.proof_value)
            .unwrap()
            .valid);
    }
}
