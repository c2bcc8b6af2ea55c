use frontier_ledger::audit_log::{AuditLog, EventType};
use frontier_ledger::auth::{AuthStore, Role};
use frontier_ledger::crypto::{anonymous_id, node_hash, sha256_hex};
use frontier_ledger::merkle::MerkleTree;
use frontier_ledger::mirror::{MirrorParty, MirrorSimulator};
use frontier_ledger::transparency::{
    ResolutionOutcome, ReviewDecision, TemplateType, TransparencyStore, DEFAULT_REQUIRED_TEMPLATES,
};
use frontier_ledger::zk::ZkEngine;
use serde_json::json;

/// Cross-component tamper-evidence suite.
///
/// Walks the ledger through its end-to-end guarantees: chain verification
/// catches edits at the exact event, Merkle roots commit to the full event
/// set, the deployment gate composes verified templates with unresolved
/// concerns, threshold proofs refuse impossible claims, and a tampered
/// mirror is pinpointed down to the record.

struct Fixture {
    _dir: tempfile::TempDir,
    audit: AuditLog,
    transparency: TransparencyStore,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let audit = AuditLog::open(dir.path().join("audit_log.json")).unwrap();
    let transparency = TransparencyStore::open(dir.path().join("transparency.json")).unwrap();
    Fixture {
        _dir: dir,
        audit,
        transparency,
    }
}

fn file_verified_required_templates(
    f: &mut Fixture,
    deployment_id: &str,
    model_id: &str,
) -> Vec<String> {
    let mut ids = Vec::new();
    for template in DEFAULT_REQUIRED_TEMPLATES {
        let evidence_hash = sha256_hex(format!("{deployment_id}/{}", template.as_str()).as_bytes());
        let submission = f
            .transparency
            .submit_compliance(
                &mut f.audit,
                "lab-1",
                deployment_id,
                model_id,
                template,
                &format!("{} for {model_id}", template.as_str()),
                &evidence_hash,
            )
            .unwrap();
        f.transparency
            .review(
                &mut f.audit,
                &submission.id,
                ReviewDecision::Verify,
                "complete",
            )
            .unwrap();
        ids.push(submission.id);
    }
    ids
}

#[test]
fn test_three_event_chain_and_merkle_root_composition() {
    let mut f = fixture();
    f.audit
        .append(EventType::SafetyEvalRun, "eval executed", Default::default())
        .unwrap();
    f.audit
        .append(EventType::SafetyEvalPassed, "eval passed", Default::default())
        .unwrap();
    f.audit
        .append(EventType::ModelDeployed, "model deployed", Default::default())
        .unwrap();

    let verification = f.audit.verify_chain().unwrap();
    assert!(verification.valid, "untouched chain must verify");

    // With three leaves the root is Hn(Hn(h0, h1), Hn(h2, h2)): the odd
    // level duplicates its last node.
    let hashes = f.audit.event_hashes();
    let expected_root = node_hash(
        &node_hash(&hashes[0], &hashes[1]),
        &node_hash(&hashes[2], &hashes[2]),
    );
    let tree = MerkleTree::from_leaves(hashes);
    assert_eq!(tree.root(), Some(expected_root.as_str()));
}

#[test]
fn test_tampered_event_breaks_chain_at_its_id() {
    let mut f = fixture();
    f.audit
        .append(EventType::SafetyEvalRun, "eval executed", Default::default())
        .unwrap();
    f.audit
        .append(EventType::SafetyEvalPassed, "eval passed", Default::default())
        .unwrap();
    f.audit
        .append(EventType::ModelDeployed, "model deployed", Default::default())
        .unwrap();

    f.audit.tamper(1, "description", json!("ok")).unwrap();

    let verification = f.audit.verify_chain().unwrap();
    assert!(!verification.valid);
    assert_eq!(verification.first_invalid_id, Some(1));
}

#[test]
fn test_every_event_has_a_valid_inclusion_proof() {
    let mut f = fixture();
    for i in 0..7 {
        f.audit
            .append(
                EventType::SafetyEvalRun,
                format!("eval {i}"),
                Default::default(),
            )
            .unwrap();
    }

    let tree = MerkleTree::from_leaves(f.audit.event_hashes());
    let root = tree.root().unwrap();
    for event in f.audit.events() {
        let proof = tree.prove(event.id as usize).unwrap();
        assert!(
            MerkleTree::verify(&event.hash, &proof, root),
            "inclusion proof failed for event {}",
            event.id
        );
    }
}

#[test]
fn test_deployment_gate_clears_with_verified_templates_and_no_concerns() {
    let mut f = fixture();
    file_verified_required_templates(&mut f, "gpt-safe-v2.1-prod", "gpt-safe-v2.1");

    let status = f.transparency.deployment_status(
        "gpt-safe-v2.1-prod",
        "gpt-safe-v2.1",
        &DEFAULT_REQUIRED_TEMPLATES,
    );
    assert!(status.cleared);
    assert!(status.blocking.is_empty());
}

#[test]
fn test_deployment_gate_blocks_on_open_concern_until_resolved() {
    let mut f = fixture();
    file_verified_required_templates(&mut f, "gpt-safe-v2.1-prod", "gpt-safe-v2.1");
    let concern = f
        .transparency
        .raise_concern(
            &mut f.audit,
            &anonymous_id("insider", "salt"),
            "eval coverage gap",
            "the deployed model skipped the long-horizon eval",
            "gpt-safe-v2.1-prod",
        )
        .unwrap();

    let status = f.transparency.deployment_status(
        "gpt-safe-v2.1-prod",
        "gpt-safe-v2.1",
        &DEFAULT_REQUIRED_TEMPLATES,
    );
    assert!(!status.cleared);
    assert_eq!(status.blocking, vec!["1 unresolved concern".to_string()]);

    f.transparency
        .resolve(
            &mut f.audit,
            &concern.id,
            "auditor-1",
            ResolutionOutcome::Accepted,
            "verified and remediated",
        )
        .unwrap();

    let status = f.transparency.deployment_status(
        "gpt-safe-v2.1-prod",
        "gpt-safe-v2.1",
        &DEFAULT_REQUIRED_TEMPLATES,
    );
    assert!(status.cleared);
}

#[test]
fn test_rejected_submission_blocks_until_superseded_and_verified() {
    let mut f = fixture();
    let submission = f
        .transparency
        .submit_compliance(
            &mut f.audit,
            "lab-1",
            "dep-1",
            "model-1",
            TemplateType::SafetyEvaluation,
            "eval v1",
            &sha256_hex(b"eval v1"),
        )
        .unwrap();
    f.transparency
        .review(
            &mut f.audit,
            &submission.id,
            ReviewDecision::Reject,
            "missing suites",
        )
        .unwrap();

    let status = f.transparency.deployment_status(
        "dep-1",
        "model-1",
        &[TemplateType::SafetyEvaluation],
    );
    assert!(!status.cleared);

    let replacement = f
        .transparency
        .submit_compliance(
            &mut f.audit,
            "lab-1",
            "dep-1",
            "model-1",
            TemplateType::SafetyEvaluation,
            "eval v2",
            &sha256_hex(b"eval v2"),
        )
        .unwrap();
    f.transparency
        .review(&mut f.audit, &replacement.id, ReviewDecision::Verify, "ok")
        .unwrap();

    let status = f.transparency.deployment_status(
        "dep-1",
        "model-1",
        &[TemplateType::SafetyEvaluation],
    );
    assert!(status.cleared);
}

#[test]
fn test_transparency_mutations_are_chained_into_the_audit_log() {
    let mut f = fixture();
    file_verified_required_templates(&mut f, "dep-1", "model-1");
    f.transparency
        .raise_concern(
            &mut f.audit,
            &anonymous_id("reporter", "salt"),
            "concern",
            "details",
            "dep-1",
        )
        .unwrap();

    // 3 submissions + 3 reviews + 1 concern = 7 audit events, all chained.
    assert_eq!(f.audit.len(), 7);
    assert!(f.audit.verify_chain().unwrap().valid);
}

#[test]
fn test_threshold_proof_succeeds_at_or_above_and_refuses_below() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = ZkEngine::open(dir.path().join("zk_store.json")).unwrap();

    let issued = engine
        .commit(7, None, json!({"metric": "safety evals run"}))
        .unwrap();
    let proof = engine.prove(&issued.commitment.id, 5).unwrap();
    assert!(engine
        .verify(&issued.commitment.id, 5, &proof.proof_value)
        .unwrap()
        .valid);

    let issued = engine.commit(3, None, serde_json::Value::Null).unwrap();
    let err = engine.prove(&issued.commitment.id, 5).unwrap_err();
    assert_eq!(err.kind(), "precondition");
}

#[test]
fn test_mirror_divergence_is_pinned_to_party_and_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut audit = AuditLog::open(dir.path().join("audit_log.json")).unwrap();
    let mut transparency =
        TransparencyStore::open(dir.path().join("transparency.json")).unwrap();
    let mut auth = AuthStore::open(dir.path().join("auth.json")).unwrap();
    let mut mirror = MirrorSimulator::open(dir.path().join("mirror_store.json")).unwrap();

    auth.register("Acme Labs", Role::Lab, "10.0.0.1").unwrap();
    auth.register("Oversight Board", Role::Auditor, "10.0.0.2")
        .unwrap();

    transparency
        .raise_concern(
            &mut audit,
            &anonymous_id("reporter", "salt"),
            "eval coverage gap",
            "details",
            "dep-1",
        )
        .unwrap();

    mirror.sync_all(transparency.mirror_records().unwrap()).unwrap();
    assert!(mirror.compare().consistent);

    mirror
        .tamper(
            MirrorParty::Lab,
            "concern",
            "concern_1",
            "title",
            json!("nothing"),
        )
        .unwrap();

    let detection = mirror.detect().unwrap();
    assert!(!detection.consistent);
    assert_eq!(detection.divergent.len(), 1);
    assert_eq!(detection.divergent[0].party, MirrorParty::Lab);
    assert_eq!(
        detection.divergent[0].mismatched_records,
        vec!["concern_1".to_string()]
    );
}
