//! Multi-party mirror simulation.
//!
//! Each of the three fixed parties (lab, auditor, government) keeps a local
//! snapshot of the transparency store's records plus a content hash over
//! their canonical form. Agreement is checked purely by hash comparison:
//! there is no election, log shipping or vector clock here, only the
//! demonstration that a silently edited local copy cannot survive a
//! recompute-and-compare pass. Snapshots persist so divergence survives a
//! restart.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::now_utc;
use crate::crypto::canonical_hash;
use crate::error::{LedgerError, Result};
use crate::storage::JsonDocument;

/// The three parties holding mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorParty {
    Lab,
    Auditor,
    Government,
}

impl MirrorParty {
    pub fn all() -> [MirrorParty; 3] {
        [MirrorParty::Lab, MirrorParty::Auditor, MirrorParty::Government]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorParty::Lab => "lab",
            MirrorParty::Auditor => "auditor",
            MirrorParty::Government => "government",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| LedgerError::Validation(format!("unknown mirror party '{s}'")))
    }
}

/// One party's local copy of the record set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorSnapshot {
    pub party: MirrorParty,
    /// Tagged records (`record_type` of `concern` or `submission`), sorted
    /// by id at sync time.
    pub records: Vec<Value>,
    /// Hash over the canonical record list as of the last sync; a tampered
    /// copy keeps its stale hash until `detect` recomputes.
    pub content_hash: String,
    pub last_synced_at: String,
}

/// Per-party summary for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorStatus {
    pub party: MirrorParty,
    pub content_hash: String,
    pub record_count: usize,
    pub last_synced_at: String,
}

/// Result of comparing stored content hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorComparison {
    pub consistent: bool,
    pub divergent_parties: Vec<MirrorParty>,
}

/// One divergent party as reported by `detect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyDivergence {
    pub party: MirrorParty,
    pub stored_hash: String,
    pub recomputed_hash: String,
    /// Ids of records that differ from the reference copy.
    pub mismatched_records: Vec<String>,
}

/// Full recompute-and-compare report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorDetection {
    pub consistent: bool,
    pub divergent: Vec<PartyDivergence>,
}

pub struct MirrorSimulator {
    snapshots: Vec<MirrorSnapshot>,
    store: JsonDocument,
}

impl MirrorSimulator {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let store = JsonDocument::new(path);
        // Snapshots are restored as-is: a divergence present on disk is
        // still a divergence after restart.
        let snapshots = store.load()?.unwrap_or_default();
        Ok(MirrorSimulator { snapshots, store })
    }

    /// Rebuild every party's snapshot from the current record set.
    pub fn sync_all(&mut self, records: Vec<Value>) -> Result<Vec<MirrorStatus>> {
        let content_hash = canonical_hash(&records)?;
        let synced_at = now_utc();

        let snapshots: Vec<MirrorSnapshot> = MirrorParty::all()
            .iter()
            .map(|party| MirrorSnapshot {
                party: *party,
                records: records.clone(),
                content_hash: content_hash.clone(),
                last_synced_at: synced_at.clone(),
            })
            .collect();

        let previous = std::mem::replace(&mut self.snapshots, snapshots);
        if let Err(err) = self.persist() {
            self.snapshots = previous;
            return Err(err);
        }
        Ok(self.status())
    }

    pub fn status(&self) -> Vec<MirrorStatus> {
        self.snapshots
            .iter()
            .map(|s| MirrorStatus {
                party: s.party,
                content_hash: s.content_hash.clone(),
                record_count: s.records.len(),
                last_synced_at: s.last_synced_at.clone(),
            })
            .collect()
    }

    /// Compare stored content hashes without recomputing anything.
    pub fn compare(&self) -> MirrorComparison {
        let hashes: Vec<&str> = self
            .snapshots
            .iter()
            .filter(|s| !s.content_hash.is_empty())
            .map(|s| s.content_hash.as_str())
            .collect();

        let consistent = hashes.windows(2).all(|w| w[0] == w[1]);
        if consistent {
            return MirrorComparison {
                consistent: true,
                divergent_parties: Vec::new(),
            };
        }

        let majority = majority_hash(&hashes);
        let divergent_parties = self
            .snapshots
            .iter()
            .filter(|s| s.content_hash != majority)
            .map(|s| s.party)
            .collect();
        MirrorComparison {
            consistent: false,
            divergent_parties,
        }
    }

    /// Demo only: edit one field of one record in one party's local copy,
    /// leaving its content hash stale.
    pub fn tamper(
        &mut self,
        party: MirrorParty,
        record_type: &str,
        record_id: &str,
        field: &str,
        new_value: Value,
    ) -> Result<Value> {
        if !matches!(record_type, "concern" | "submission") {
            return Err(LedgerError::Validation(format!(
                "record_type must be 'concern' or 'submission', got '{record_type}'"
            )));
        }

        let snapshot = self
            .snapshots
            .iter_mut()
            .find(|s| s.party == party)
            .ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "party {} has no snapshot; sync first",
                    party.as_str()
                ))
            })?;

        let record = snapshot
            .records
            .iter_mut()
            .find(|r| r["record_type"] == record_type && r["id"] == record_id)
            .ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "{record_type} {record_id} not present in {}'s mirror",
                    party.as_str()
                ))
            })?;

        let previous = record.clone();
        match record.as_object_mut() {
            Some(obj) => {
                obj.insert(field.to_string(), new_value);
            }
            None => {
                return Err(LedgerError::Validation(
                    "mirror record is not a JSON object".into(),
                ))
            }
        }
        let tampered = record.clone();

        if let Err(err) = self.persist() {
            if let Some(snapshot) = self.snapshots.iter_mut().find(|s| s.party == party) {
                if let Some(record) = snapshot
                    .records
                    .iter_mut()
                    .find(|r| r["record_type"] == record_type && r["id"] == record_id)
                {
                    *record = previous;
                }
            }
            return Err(err);
        }
        Ok(tampered)
    }

    /// Recompute every party's content hash and report divergence, with the
    /// ids of the records that differ from the reference copy.
    pub fn detect(&self) -> Result<MirrorDetection> {
        if self.snapshots.is_empty() {
            return Ok(MirrorDetection {
                consistent: true,
                divergent: Vec::new(),
            });
        }

        let recomputed: Vec<String> = self
            .snapshots
            .iter()
            .map(|s| canonical_hash(&s.records))
            .collect::<Result<_>>()?;

        let hash_refs: Vec<&str> = recomputed.iter().map(String::as_str).collect();
        let majority = majority_hash(&hash_refs).to_string();
        let reference_records = self
            .snapshots
            .iter()
            .zip(&recomputed)
            .find(|(_, hash)| **hash == majority)
            .map(|(s, _)| &s.records);

        let mut divergent = Vec::new();
        for (snapshot, recomputed_hash) in self.snapshots.iter().zip(&recomputed) {
            let stale_hash = snapshot.content_hash != *recomputed_hash;
            let off_majority = *recomputed_hash != majority;
            if !stale_hash && !off_majority {
                continue;
            }
            let mismatched_records = reference_records
                .map(|reference| diff_record_ids(&snapshot.records, reference))
                .unwrap_or_default();
            divergent.push(PartyDivergence {
                party: snapshot.party,
                stored_hash: snapshot.content_hash.clone(),
                recomputed_hash: recomputed_hash.clone(),
                mismatched_records,
            });
        }

        Ok(MirrorDetection {
            consistent: divergent.is_empty(),
            divergent,
        })
    }

    /// Demo only: drop all snapshots.
    pub fn reset(&mut self) -> Result<()> {
        let previous = std::mem::take(&mut self.snapshots);
        if let Err(err) = self.persist() {
            self.snapshots = previous;
            return Err(err);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.snapshots)
    }
}

/// The most common hash wins; ties resolve to the earliest party's hash so
/// the result is deterministic.
fn majority_hash<'a>(hashes: &[&'a str]) -> &'a str {
    let mut best: &'a str = hashes.first().copied().unwrap_or_default();
    let mut best_count = 0;
    for &hash in hashes {
        let count = hashes.iter().filter(|&&h| h == hash).count();
        if count > best_count {
            best = hash;
            best_count = count;
        }
    }
    best
}

/// Ids present in either list whose record content differs between the two.
fn diff_record_ids(local: &[Value], reference: &[Value]) -> Vec<String> {
    let mut mismatched = Vec::new();
    for record in local {
        let id = record["id"].as_str().unwrap_or_default();
        match reference.iter().find(|r| r["id"] == id) {
            Some(counterpart) if counterpart == record => {}
            _ => mismatched.push(id.to_string()),
        }
    }
    for record in reference {
        let id = record["id"].as_str().unwrap_or_default();
        if !local.iter().any(|r| r["id"] == id) {
            mismatched.push(id.to_string());
        }
    }
    mismatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_records() -> Vec<Value> {
        vec![
            json!({
                "record_type": "concern",
                "id": "concern_1",
                "title": "undisclosed eval gap",
                "status": "open",
            }),
            json!({
                "record_type": "submission",
                "id": "submission_1",
                "title": "safety eval results",
                "status": "verified",
            }),
        ]
    }

    fn open_simulator() -> (tempfile::TempDir, MirrorSimulator) {
        let dir = tempdir().unwrap();
        let sim = MirrorSimulator::open(dir.path().join("mirror_store.json")).unwrap();
        (dir, sim)
    }

    #[test]
    fn test_sync_all_consistent() {
        let (_dir, mut sim) = open_simulator();
        let status = sim.sync_all(sample_records()).unwrap();
        assert_eq!(status.len(), 3);
        assert!(status.windows(2).all(|w| w[0].content_hash == w[1].content_hash));
        assert!(sim.compare().consistent);
        assert!(sim.detect().unwrap().consistent);
    }

    #[test]
    fn test_tamper_detected_for_exact_party_and_record() {
        let (_dir, mut sim) = open_simulator();
        sim.sync_all(sample_records()).unwrap();
        sim.tamper(
            MirrorParty::Lab,
            "concern",
            "concern_1",
            "title",
            json!("nothing"),
        )
        .unwrap();

        // Stored hashes are stale, so compare still reports agreement.
        assert!(sim.compare().consistent);

        let detection = sim.detect().unwrap();
        assert!(!detection.consistent);
        assert_eq!(detection.divergent.len(), 1);
        let divergence = &detection.divergent[0];
        assert_eq!(divergence.party, MirrorParty::Lab);
        assert_ne!(divergence.stored_hash, divergence.recomputed_hash);
        assert_eq!(divergence.mismatched_records, vec!["concern_1".to_string()]);
    }

    #[test]
    fn test_tamper_unknown_record() {
        let (_dir, mut sim) = open_simulator();
        sim.sync_all(sample_records()).unwrap();
        let err = sim
            .tamper(MirrorParty::Auditor, "concern", "concern_99", "title", json!("x"))
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_tamper_before_sync() {
        let (_dir, mut sim) = open_simulator();
        let err = sim
            .tamper(MirrorParty::Lab, "concern", "concern_1", "title", json!("x"))
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_empty_simulator_is_consistent() {
        let (_dir, sim) = open_simulator();
        assert!(sim.compare().consistent);
        assert!(sim.detect().unwrap().consistent);
        assert!(sim.status().is_empty());
    }

    #[test]
    fn test_divergence_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mirror_store.json");
        {
            let mut sim = MirrorSimulator::open(&path).unwrap();
            sim.sync_all(sample_records()).unwrap();
            sim.tamper(
                MirrorParty::Government,
                "submission",
                "submission_1",
                "status",
                json!("rejected"),
            )
            .unwrap();
        }
        let sim = MirrorSimulator::open(&path).unwrap();
        let detection = sim.detect().unwrap();
        assert!(!detection.consistent);
        assert_eq!(detection.divergent[0].party, MirrorParty::Government);
        assert_eq!(
            detection.divergent[0].mismatched_records,
            vec!["submission_1".to_string()]
        );
    }

    #[test]
    fn test_reset_clears_snapshots() {
        let (_dir, mut sim) = open_simulator();
        sim.sync_all(sample_records()).unwrap();
        sim.reset().unwrap();
        assert!(sim.status().is_empty());
    }

    #[test]
    fn test_resync_clears_divergence() {
        let (_dir, mut sim) = open_simulator();
        sim.sync_all(sample_records()).unwrap();
        sim.tamper(MirrorParty::Lab, "concern", "concern_1", "status", json!("resolved"))
            .unwrap();
        assert!(!sim.detect().unwrap().consistent);
        sim.sync_all(sample_records()).unwrap();
        assert!(sim.detect().unwrap().consistent);
    }
}
