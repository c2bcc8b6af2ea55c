//! Transparency store: concerns, responses, resolutions and compliance
//! submissions, feeding the deployment gate.
//!
//! Every mutating operation appends a matching audit event so the
//! tamper-evidence of the hash chain covers the transparency layer too. The
//! coupling is not atomic across components; the store follows a rollback
//! policy: if the audit append fails, the primary mutation is undone and
//! persisted state restored, and the caller sees a persistence error.

pub mod compliance;
pub mod concern;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::audit_log::{AuditLog, EventType};
use crate::canonical::now_utc;
use crate::crypto::{is_anonymous_id, is_sha256_hex};
use crate::error::{LedgerError, Result};
use crate::storage::JsonDocument;

pub use compliance::{
    evaluate_deployment, template_catalog, ComplianceSubmission, DeploymentComplianceStatus,
    ReviewDecision, SubmissionStatus, TemplateCatalogEntry, TemplateRequirement, TemplateType,
    DEFAULT_REQUIRED_TEMPLATES,
};
pub use concern::{Concern, ConcernStatus, Resolution, ResolutionOutcome, ResponderRole, Response};

/// The persisted shape of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TransparencyState {
    concerns: Vec<Concern>,
    responses: Vec<Response>,
    submissions: Vec<ComplianceSubmission>,
}

/// Aggregate counters served by the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub concerns_total: usize,
    pub concerns_open: usize,
    pub concerns_responded: usize,
    pub concerns_disputed: usize,
    pub concerns_resolved: usize,
    pub responses_total: usize,
    pub resolutions_total: usize,
    pub submissions_total: usize,
    pub submissions_submitted: usize,
    pub submissions_under_review: usize,
    pub submissions_verified: usize,
    pub submissions_rejected: usize,
}

pub struct TransparencyStore {
    state: TransparencyState,
    store: JsonDocument,
}

impl TransparencyStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let store = JsonDocument::new(path);
        let state = store.load()?.unwrap_or_default();
        Ok(TransparencyStore { state, store })
    }

    // ------------------------------------------------------------------
    // Concerns
    // ------------------------------------------------------------------

    /// File a new concern in `open` state.
    pub fn raise_concern(
        &mut self,
        audit: &mut AuditLog,
        anon_id: &str,
        title: &str,
        description: &str,
        target: &str,
    ) -> Result<Concern> {
        if !is_anonymous_id(anon_id) {
            return Err(LedgerError::Validation(format!(
                "anon_id must be 'anon_' followed by 12 hex characters, got '{anon_id}'"
            )));
        }
        if title.trim().is_empty() {
            return Err(LedgerError::Validation("title must not be empty".into()));
        }

        let concern = Concern {
            id: format!("concern_{}", self.state.concerns.len() + 1),
            anon_id: anon_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            target: target.to_string(),
            status: ConcernStatus::Open,
            created_at: now_utc(),
            resolution: None,
        };

        self.state.concerns.push(concern.clone());
        if let Err(err) = self.persist() {
            self.state.concerns.pop();
            return Err(err);
        }

        self.audit_or_rollback(
            audit,
            EventType::IncidentReported,
            format!("concern raised: {title}"),
            audit_metadata(&[
                ("action", "concern_raised"),
                ("concern_id", &concern.id),
                ("target", target),
            ]),
            |state| {
                state.concerns.pop();
            },
        )?;
        Ok(concern)
    }

    /// Answer a concern. Open concerns become `responded`; disputed ones
    /// keep their status; resolved ones reject the response.
    pub fn respond(
        &mut self,
        audit: &mut AuditLog,
        concern_id: &str,
        responder_role: ResponderRole,
        content: &str,
    ) -> Result<Response> {
        let index = self.concern_index(concern_id)?;
        let previous_status = self.state.concerns[index].status;
        if previous_status == ConcernStatus::Resolved {
            return Err(LedgerError::State(format!(
                "concern {concern_id} is resolved and no longer accepts responses"
            )));
        }

        let response = Response {
            id: format!("response_{}", self.state.responses.len() + 1),
            concern_id: concern_id.to_string(),
            responder_role,
            content: content.to_string(),
            created_at: now_utc(),
        };

        if previous_status == ConcernStatus::Open {
            self.state.concerns[index].status = ConcernStatus::Responded;
        }
        self.state.responses.push(response.clone());
        if let Err(err) = self.persist() {
            self.state.responses.pop();
            self.state.concerns[index].status = previous_status;
            return Err(err);
        }

        self.audit_or_rollback(
            audit,
            EventType::IncidentReported,
            format!("response filed on {concern_id}"),
            audit_metadata(&[
                ("action", "concern_responded"),
                ("concern_id", concern_id),
                ("response_id", &response.id),
            ]),
            move |state| {
                state.responses.pop();
                state.concerns[index].status = previous_status;
            },
        )?;
        Ok(response)
    }

    /// Escalate a concern to `disputed`. Legal from open or responded.
    pub fn dispute(&mut self, audit: &mut AuditLog, concern_id: &str) -> Result<Concern> {
        let index = self.concern_index(concern_id)?;
        let previous_status = self.state.concerns[index].status;
        match previous_status {
            ConcernStatus::Open | ConcernStatus::Responded => {}
            other => {
                return Err(LedgerError::State(format!(
                    "concern {concern_id} cannot be disputed from status '{}'",
                    other.as_str()
                )))
            }
        }

        self.state.concerns[index].status = ConcernStatus::Disputed;
        if let Err(err) = self.persist() {
            self.state.concerns[index].status = previous_status;
            return Err(err);
        }

        self.audit_or_rollback(
            audit,
            EventType::IncidentReported,
            format!("concern {concern_id} disputed"),
            audit_metadata(&[("action", "concern_disputed"), ("concern_id", concern_id)]),
            move |state| {
                state.concerns[index].status = previous_status;
            },
        )?;
        Ok(self.state.concerns[index].clone())
    }

    /// Close a concern with an auditor resolution. Terminal.
    pub fn resolve(
        &mut self,
        audit: &mut AuditLog,
        concern_id: &str,
        auditor_id: &str,
        outcome: ResolutionOutcome,
        notes: &str,
    ) -> Result<Resolution> {
        let index = self.concern_index(concern_id)?;
        let previous = self.state.concerns[index].clone();
        if previous.status == ConcernStatus::Resolved {
            return Err(LedgerError::State(format!(
                "concern {concern_id} is already resolved"
            )));
        }

        let resolution_count = self
            .state
            .concerns
            .iter()
            .filter(|c| c.resolution.is_some())
            .count();
        let resolution = Resolution {
            id: format!("resolution_{}", resolution_count + 1),
            concern_id: concern_id.to_string(),
            auditor_id: auditor_id.to_string(),
            outcome,
            notes: notes.to_string(),
            created_at: now_utc(),
        };

        self.state.concerns[index].status = ConcernStatus::Resolved;
        self.state.concerns[index].resolution = Some(resolution.clone());
        if let Err(err) = self.persist() {
            self.state.concerns[index] = previous;
            return Err(err);
        }

        let previous_for_audit = previous.clone();
        self.audit_or_rollback(
            audit,
            EventType::IncidentReported,
            format!("concern {concern_id} resolved"),
            audit_metadata(&[
                ("action", "concern_resolved"),
                ("concern_id", concern_id),
                ("resolution_id", &resolution.id),
                ("auditor_id", auditor_id),
            ]),
            move |state| {
                state.concerns[index] = previous_for_audit;
            },
        )?;
        Ok(resolution)
    }

    // ------------------------------------------------------------------
    // Compliance submissions
    // ------------------------------------------------------------------

    /// File a compliance submission in `submitted` state.
    pub fn submit_compliance(
        &mut self,
        audit: &mut AuditLog,
        lab_id: &str,
        deployment_id: &str,
        model_id: &str,
        template_type: TemplateType,
        title: &str,
        evidence_hash: &str,
    ) -> Result<ComplianceSubmission> {
        if !is_sha256_hex(evidence_hash) {
            return Err(LedgerError::Validation(
                "evidence_hash must be 64 lowercase hex characters".into(),
            ));
        }
        if deployment_id.trim().is_empty() || model_id.trim().is_empty() {
            return Err(LedgerError::Validation(
                "deployment_id and model_id must not be empty".into(),
            ));
        }

        let submission = ComplianceSubmission {
            id: format!("submission_{}", self.state.submissions.len() + 1),
            lab_id: lab_id.to_string(),
            deployment_id: deployment_id.to_string(),
            model_id: model_id.to_string(),
            template_type,
            title: title.to_string(),
            evidence_hash: evidence_hash.to_string(),
            status: SubmissionStatus::Submitted,
            submitted_at: now_utc(),
            reviewed_at: None,
            reviewer_notes: None,
        };

        self.state.submissions.push(submission.clone());
        if let Err(err) = self.persist() {
            self.state.submissions.pop();
            return Err(err);
        }

        self.audit_or_rollback(
            audit,
            EventType::SafetyEvalRun,
            format!("compliance submission filed: {title}"),
            audit_metadata(&[
                ("action", "compliance_submitted"),
                ("submission_id", &submission.id),
                ("deployment_id", deployment_id),
                ("template_type", template_type.as_str()),
            ]),
            |state| {
                state.submissions.pop();
            },
        )?;
        Ok(submission)
    }

    /// Move a submission from `submitted` to `under_review`.
    pub fn begin_review(
        &mut self,
        audit: &mut AuditLog,
        submission_id: &str,
    ) -> Result<ComplianceSubmission> {
        let index = self.submission_index(submission_id)?;
        let previous_status = self.state.submissions[index].status;
        if previous_status != SubmissionStatus::Submitted {
            return Err(LedgerError::State(format!(
                "submission {submission_id} cannot enter review from status '{:?}'",
                previous_status
            )));
        }

        self.state.submissions[index].status = SubmissionStatus::UnderReview;
        if let Err(err) = self.persist() {
            self.state.submissions[index].status = previous_status;
            return Err(err);
        }

        self.audit_or_rollback(
            audit,
            EventType::SafetyEvalRun,
            format!("review started on {submission_id}"),
            audit_metadata(&[
                ("action", "review_started"),
                ("submission_id", submission_id),
            ]),
            move |state| {
                state.submissions[index].status = previous_status;
            },
        )?;
        Ok(self.state.submissions[index].clone())
    }

    /// Auditor verdict: verify or reject. Legal from `submitted` or
    /// `under_review`; both outcomes are terminal.
    pub fn review(
        &mut self,
        audit: &mut AuditLog,
        submission_id: &str,
        decision: ReviewDecision,
        notes: &str,
    ) -> Result<ComplianceSubmission> {
        let index = self.submission_index(submission_id)?;
        let previous = self.state.submissions[index].clone();
        if previous.status.is_terminal() {
            return Err(LedgerError::State(format!(
                "submission {submission_id} already reviewed; file a new submission to supersede it"
            )));
        }

        let (new_status, event_type) = match decision {
            ReviewDecision::Verify => (SubmissionStatus::Verified, EventType::SafetyEvalPassed),
            ReviewDecision::Reject => (SubmissionStatus::Rejected, EventType::SafetyEvalFailed),
        };

        {
            let submission = &mut self.state.submissions[index];
            submission.status = new_status;
            submission.reviewed_at = Some(now_utc());
            submission.reviewer_notes = Some(notes.to_string());
        }
        if let Err(err) = self.persist() {
            self.state.submissions[index] = previous;
            return Err(err);
        }

        let previous_for_audit = previous.clone();
        self.audit_or_rollback(
            audit,
            event_type,
            format!("submission {submission_id} reviewed"),
            audit_metadata(&[
                ("action", "compliance_reviewed"),
                ("submission_id", submission_id),
                (
                    "decision",
                    match decision {
                        ReviewDecision::Verify => "verify",
                        ReviewDecision::Reject => "reject",
                    },
                ),
            ]),
            move |state| {
                state.submissions[index] = previous_for_audit;
            },
        )?;
        Ok(self.state.submissions[index].clone())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn deployment_status(
        &self,
        deployment_id: &str,
        model_id: &str,
        required: &[TemplateType],
    ) -> DeploymentComplianceStatus {
        evaluate_deployment(
            &self.state.submissions,
            &self.state.concerns,
            deployment_id,
            model_id,
            required,
        )
    }

    pub fn concerns(&self, status: Option<ConcernStatus>) -> Vec<Concern> {
        self.state
            .concerns
            .iter()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect()
    }

    pub fn concern(&self, id: &str) -> Result<&Concern> {
        self.state
            .concerns
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("concern {id} does not exist")))
    }

    pub fn responses_for(&self, concern_id: &str) -> Vec<Response> {
        self.state
            .responses
            .iter()
            .filter(|r| r.concern_id == concern_id)
            .cloned()
            .collect()
    }

    pub fn submissions(
        &self,
        status: Option<SubmissionStatus>,
        template_type: Option<TemplateType>,
        deployment_id: Option<&str>,
    ) -> Vec<ComplianceSubmission> {
        self.state
            .submissions
            .iter()
            .filter(|s| status.map_or(true, |v| s.status == v))
            .filter(|s| template_type.map_or(true, |v| s.template_type == v))
            .filter(|s| deployment_id.map_or(true, |v| s.deployment_id == v))
            .cloned()
            .collect()
    }

    pub fn submission(&self, id: &str) -> Result<&ComplianceSubmission> {
        self.state
            .submissions
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("submission {id} does not exist")))
    }

    pub fn stats(&self) -> TransparencyStats {
        let by_concern_status = |status: ConcernStatus| {
            self.state
                .concerns
                .iter()
                .filter(|c| c.status == status)
                .count()
        };
        let by_submission_status = |status: SubmissionStatus| {
            self.state
                .submissions
                .iter()
                .filter(|s| s.status == status)
                .count()
        };
        TransparencyStats {
            concerns_total: self.state.concerns.len(),
            concerns_open: by_concern_status(ConcernStatus::Open),
            concerns_responded: by_concern_status(ConcernStatus::Responded),
            concerns_disputed: by_concern_status(ConcernStatus::Disputed),
            concerns_resolved: by_concern_status(ConcernStatus::Resolved),
            responses_total: self.state.responses.len(),
            resolutions_total: self
                .state
                .concerns
                .iter()
                .filter(|c| c.resolution.is_some())
                .count(),
            submissions_total: self.state.submissions.len(),
            submissions_submitted: by_submission_status(SubmissionStatus::Submitted),
            submissions_under_review: by_submission_status(SubmissionStatus::UnderReview),
            submissions_verified: by_submission_status(SubmissionStatus::Verified),
            submissions_rejected: by_submission_status(SubmissionStatus::Rejected),
        }
    }

    /// The canonical record set the mirror simulator snapshots: every
    /// submission and concern as a tagged JSON object, sorted by id.
    pub fn mirror_records(&self) -> Result<Vec<Value>> {
        let mut records = Vec::with_capacity(self.state.concerns.len() + self.state.submissions.len());
        for concern in &self.state.concerns {
            let mut value = serde_json::to_value(concern)?;
            value["record_type"] = json!("concern");
            records.push(value);
        }
        for submission in &self.state.submissions {
            let mut value = serde_json::to_value(submission)?;
            value["record_type"] = json!("submission");
            records.push(value);
        }
        records.sort_by(|a, b| {
            let id_a = a["id"].as_str().unwrap_or_default();
            let id_b = b["id"].as_str().unwrap_or_default();
            id_a.cmp(id_b)
        });
        Ok(records)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn concern_index(&self, id: &str) -> Result<usize> {
        self.state
            .concerns
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("concern {id} does not exist")))
    }

    fn submission_index(&self, id: &str) -> Result<usize> {
        self.state
            .submissions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("submission {id} does not exist")))
    }

    /// Append the coupled audit event; on failure undo the primary mutation
    /// via `rollback`, persist the restored state best-effort, and surface a
    /// persistence error.
    fn audit_or_rollback(
        &mut self,
        audit: &mut AuditLog,
        event_type: EventType,
        description: String,
        metadata: Map<String, Value>,
        rollback: impl FnOnce(&mut TransparencyState),
    ) -> Result<()> {
        if let Err(err) = audit.append(event_type, description, metadata) {
            rollback(&mut self.state);
            if let Err(persist_err) = self.persist() {
                tracing::warn!(error = %persist_err, "failed to persist rolled-back state");
            }
            tracing::warn!(error = %err, "transparency mutation rolled back: audit append failed");
            return Err(LedgerError::Persistence(format!(
                "audit append failed, mutation rolled back: {err}"
            )));
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.state)
    }
}

fn audit_metadata(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::anonymous_id;
    use tempfile::tempdir;

    fn open_stores() -> (tempfile::TempDir, TransparencyStore, AuditLog) {
        let dir = tempdir().unwrap();
        let store = TransparencyStore::open(dir.path().join("transparency.json")).unwrap();
        let audit = AuditLog::open(dir.path().join("audit_log.json")).unwrap();
        (dir, store, audit)
    }

    fn raise(store: &mut TransparencyStore, audit: &mut AuditLog, target: &str) -> Concern {
        store
            .raise_concern(
                audit,
                &anonymous_id("reporter", "salt"),
                "undisclosed eval gap",
                "the published eval results omit a failing suite",
                target,
            )
            .unwrap()
    }

    #[test]
    fn test_raise_concern_opens_and_audits() {
        let (_dir, mut store, mut audit) = open_stores();
        let concern = raise(&mut store, &mut audit, "dep-1");
        assert_eq!(concern.id, "concern_1");
        assert_eq!(concern.status, ConcernStatus::Open);
        assert_eq!(audit.len(), 1);
        assert_eq!(audit.events()[0].event_type, EventType::IncidentReported);
    }

    #[test]
    fn test_raise_concern_rejects_bad_anon_id() {
        let (_dir, mut store, mut audit) = open_stores();
        let err = store
            .raise_concern(&mut audit, "anonymous", "t", "d", "dep-1")
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(audit.len(), 0);
    }

    #[test]
    fn test_respond_moves_open_to_responded() {
        let (_dir, mut store, mut audit) = open_stores();
        let concern = raise(&mut store, &mut audit, "dep-1");
        let response = store
            .respond(&mut audit, &concern.id, ResponderRole::Lab, "we are checking")
            .unwrap();
        assert_eq!(response.id, "response_1");
        assert_eq!(
            store.concern(&concern.id).unwrap().status,
            ConcernStatus::Responded
        );
    }

    #[test]
    fn test_respond_leaves_disputed_untouched() {
        let (_dir, mut store, mut audit) = open_stores();
        let concern = raise(&mut store, &mut audit, "dep-1");
        store.dispute(&mut audit, &concern.id).unwrap();
        store
            .respond(&mut audit, &concern.id, ResponderRole::Auditor, "noted")
            .unwrap();
        assert_eq!(
            store.concern(&concern.id).unwrap().status,
            ConcernStatus::Disputed
        );
    }

    #[test]
    fn test_respond_rejected_on_resolved() {
        let (_dir, mut store, mut audit) = open_stores();
        let concern = raise(&mut store, &mut audit, "dep-1");
        store
            .resolve(
                &mut audit,
                &concern.id,
                "auditor-1",
                ResolutionOutcome::Accepted,
                "confirmed and fixed",
            )
            .unwrap();
        let err = store
            .respond(&mut audit, &concern.id, ResponderRole::Lab, "late reply")
            .unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn test_dispute_from_resolved_is_illegal() {
        let (_dir, mut store, mut audit) = open_stores();
        let concern = raise(&mut store, &mut audit, "dep-1");
        store
            .resolve(
                &mut audit,
                &concern.id,
                "auditor-1",
                ResolutionOutcome::Rejected,
                "unfounded",
            )
            .unwrap();
        assert_eq!(
            store.dispute(&mut audit, &concern.id).unwrap_err().kind(),
            "state"
        );
    }

    #[test]
    fn test_resolve_is_terminal_and_embeds_resolution() {
        let (_dir, mut store, mut audit) = open_stores();
        let concern = raise(&mut store, &mut audit, "dep-1");
        let resolution = store
            .resolve(
                &mut audit,
                &concern.id,
                "auditor-1",
                ResolutionOutcome::NeedsMoreInfo,
                "need raw eval transcripts",
            )
            .unwrap();
        assert_eq!(resolution.id, "resolution_1");

        let stored = store.concern(&concern.id).unwrap();
        assert!(stored.is_resolved());
        assert_eq!(stored.resolution.as_ref().unwrap().auditor_id, "auditor-1");

        let err = store
            .resolve(
                &mut audit,
                &concern.id,
                "auditor-2",
                ResolutionOutcome::Accepted,
                "again",
            )
            .unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn test_submit_compliance_validates_evidence_hash() {
        let (_dir, mut store, mut audit) = open_stores();
        let err = store
            .submit_compliance(
                &mut audit,
                "lab-1",
                "dep-1",
                "model-1",
                TemplateType::SafetyEvaluation,
                "eval results",
                "not-a-hash",
            )
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(audit.len(), 0);
    }

    #[test]
    fn test_submission_audit_event_types() {
        let (_dir, mut store, mut audit) = open_stores();
        let submission = store
            .submit_compliance(
                &mut audit,
                "lab-1",
                "dep-1",
                "model-1",
                TemplateType::SafetyEvaluation,
                "eval results",
                &"ab".repeat(32),
            )
            .unwrap();
        store
            .review(&mut audit, &submission.id, ReviewDecision::Verify, "looks complete")
            .unwrap();

        let types: Vec<_> = audit.events().iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![EventType::SafetyEvalRun, EventType::SafetyEvalPassed]
        );
    }

    #[test]
    fn test_review_terminal_states_are_final() {
        let (_dir, mut store, mut audit) = open_stores();
        let submission = store
            .submit_compliance(
                &mut audit,
                "lab-1",
                "dep-1",
                "model-1",
                TemplateType::RedTeamReport,
                "red team",
                &"cd".repeat(32),
            )
            .unwrap();
        store
            .review(&mut audit, &submission.id, ReviewDecision::Reject, "incomplete")
            .unwrap();
        let err = store
            .review(&mut audit, &submission.id, ReviewDecision::Verify, "retry")
            .unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn test_begin_review_transition() {
        let (_dir, mut store, mut audit) = open_stores();
        let submission = store
            .submit_compliance(
                &mut audit,
                "lab-1",
                "dep-1",
                "model-1",
                TemplateType::CapabilityAssessment,
                "capabilities",
                &"ef".repeat(32),
            )
            .unwrap();
        let under_review = store.begin_review(&mut audit, &submission.id).unwrap();
        assert_eq!(under_review.status, SubmissionStatus::UnderReview);
        // Review is still legal from under_review.
        let verified = store
            .review(&mut audit, &submission.id, ReviewDecision::Verify, "ok")
            .unwrap();
        assert_eq!(verified.status, SubmissionStatus::Verified);
        // But a second begin_review is not.
        assert_eq!(
            store
                .begin_review(&mut audit, &submission.id)
                .unwrap_err()
                .kind(),
            "state"
        );
    }

    #[test]
    fn test_rejected_superseded_by_new_submission() {
        let (_dir, mut store, mut audit) = open_stores();
        let first = store
            .submit_compliance(
                &mut audit,
                "lab-1",
                "dep-1",
                "model-1",
                TemplateType::SafetyEvaluation,
                "eval v1",
                &"ab".repeat(32),
            )
            .unwrap();
        store
            .review(&mut audit, &first.id, ReviewDecision::Reject, "missing suites")
            .unwrap();
        let second = store
            .submit_compliance(
                &mut audit,
                "lab-1",
                "dep-1",
                "model-1",
                TemplateType::SafetyEvaluation,
                "eval v2",
                &"cd".repeat(32),
            )
            .unwrap();
        store
            .review(&mut audit, &second.id, ReviewDecision::Verify, "complete now")
            .unwrap();

        let status = store.deployment_status("dep-1", "model-1", &[TemplateType::SafetyEvaluation]);
        assert!(status.cleared);
        assert_eq!(
            status.required_templates[0].submission_id.as_deref(),
            Some(second.id.as_str())
        );
    }

    #[test]
    fn test_stats_counts() {
        let (_dir, mut store, mut audit) = open_stores();
        let concern = raise(&mut store, &mut audit, "dep-1");
        store
            .respond(&mut audit, &concern.id, ResponderRole::Lab, "reply")
            .unwrap();
        store
            .submit_compliance(
                &mut audit,
                "lab-1",
                "dep-1",
                "model-1",
                TemplateType::TrainingData,
                "data card",
                &"ab".repeat(32),
            )
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.concerns_total, 1);
        assert_eq!(stats.concerns_responded, 1);
        assert_eq!(stats.responses_total, 1);
        assert_eq!(stats.submissions_total, 1);
        assert_eq!(stats.submissions_submitted, 1);
    }

    #[test]
    fn test_mirror_records_sorted_and_tagged() {
        let (_dir, mut store, mut audit) = open_stores();
        store
            .submit_compliance(
                &mut audit,
                "lab-1",
                "dep-1",
                "model-1",
                TemplateType::TrainingData,
                "data card",
                &"ab".repeat(32),
            )
            .unwrap();
        raise(&mut store, &mut audit, "dep-1");

        let records = store.mirror_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["record_type"], "concern");
        assert_eq!(records[1]["record_type"], "submission");
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempdir().unwrap();
        let transparency_path = dir.path().join("transparency.json");
        let audit_path = dir.path().join("audit_log.json");
        {
            let mut store = TransparencyStore::open(&transparency_path).unwrap();
            let mut audit = AuditLog::open(&audit_path).unwrap();
            raise(&mut store, &mut audit, "dep-1");
        }
        let store = TransparencyStore::open(&transparency_path).unwrap();
        assert_eq!(store.concerns(None).len(), 1);
        assert_eq!(store.concern("concern_1").unwrap().status, ConcernStatus::Open);
    }
}
