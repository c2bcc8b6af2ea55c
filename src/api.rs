//! REST surface of the transparency ledger.
//!
//! The HTTP layer validates requests, consults the auth store, mutates the
//! owning component under its lock, and maps component errors onto status
//! codes. Role checks are mandatory on role-gated endpoints: a missing key
//! is 401, a wrong role is 403. Integrity results (chain verification,
//! mirror detection) are returned as response bodies, never as errors.

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::audit_log::{AuditLog, ChainVerification, Event, EventType};
use crate::auth::{require_role, AuthStore, PartyInfo, RegisteredKey, Role};
use crate::config::Config;
use crate::crypto::anonymous_id;
use crate::error::{LedgerError, Result as LedgerResult};
use crate::merkle::{MerkleTree, ProofStep};
use crate::mirror::{
    MirrorComparison, MirrorDetection, MirrorParty, MirrorSimulator, MirrorStatus,
};
use crate::transparency::{
    template_catalog, ComplianceSubmission, Concern, ConcernStatus, DeploymentComplianceStatus,
    Resolution, ResolutionOutcome, ResponderRole, Response as ConcernResponse, ReviewDecision,
    SubmissionStatus, TemplateCatalogEntry, TemplateType, TransparencyStats, TransparencyStore,
};
use crate::zk::{IssuedCommitment, ZkCommitment, ZkEngine, ZkProof, ZkVerification};

// ============================================================================
// SHARED STATE
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    audit: Arc<RwLock<AuditLog>>,
    transparency: Arc<RwLock<TransparencyStore>>,
    zk: Arc<RwLock<ZkEngine>>,
    auth: Arc<RwLock<AuthStore>>,
    mirror: Arc<RwLock<MirrorSimulator>>,
    config: Arc<Config>,
}

impl AppState {
    /// Open every component store under `data_dir`.
    pub fn open(data_dir: &FsPath, config: Config) -> LedgerResult<Self> {
        Ok(AppState {
            audit: Arc::new(RwLock::new(AuditLog::open(data_dir.join("audit_log.json"))?)),
            transparency: Arc::new(RwLock::new(TransparencyStore::open(
                data_dir.join("transparency.json"),
            )?)),
            zk: Arc::new(RwLock::new(ZkEngine::open(data_dir.join("zk_store.json"))?)),
            auth: Arc::new(RwLock::new(AuthStore::open(data_dir.join("auth.json"))?)),
            mirror: Arc::new(RwLock::new(MirrorSimulator::open(
                data_dir.join("mirror_store.json"),
            )?)),
            config: Arc::new(config),
        })
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

#[derive(Serialize)]
pub struct ErrorResponse {
    error: &'static str,
    message: String,
}

pub struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::Validation(_) | LedgerError::Precondition(_) => StatusCode::BAD_REQUEST,
            LedgerError::Auth(_) => StatusCode::UNAUTHORIZED,
            LedgerError::Role(_) => StatusCode::FORBIDDEN,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::State(_) => StatusCode::CONFLICT,
            LedgerError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            LedgerError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// ============================================================================
// AUTH HELPERS
// ============================================================================

fn authenticated(state: &AppState, headers: &HeaderMap) -> LedgerResult<crate::auth::Party> {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| LedgerError::Auth("missing X-API-Key header".into()))?;
    state.auth.read().authenticate(key)
}

fn authenticated_with_role(
    state: &AppState,
    headers: &HeaderMap,
    role: Role,
) -> LedgerResult<crate::auth::Party> {
    let party = authenticated(state, headers)?;
    require_role(&party, role)?;
    Ok(party)
}

/// Rate-limit key for the caller: first hop of X-Forwarded-For when
/// present, else the socket peer address.
fn client_addr(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| connect_info.map(|ci| ci.0.ip().to_string()))
        .unwrap_or_else(|| "local".to_string())
}

// ============================================================================
// LEDGER ENDPOINTS
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct CreateEventRequest {
    event_type: String,
    description: String,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

async fn create_event(
    State(state): State<AppState>,
    Json(payload): Json<CreateEventRequest>,
) -> ApiResult<Event> {
    let event_type = EventType::parse(&payload.event_type)?;
    let event = state.audit.write().append(
        event_type,
        payload.description,
        payload.metadata.unwrap_or_default(),
    )?;
    Ok(Json(event))
}

#[derive(Deserialize)]
struct EventsQuery {
    event_type: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct EventsResponse {
    events: Vec<Event>,
    count: usize,
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<EventsResponse> {
    let event_type = query
        .event_type
        .as_deref()
        .map(EventType::parse)
        .transpose()?;
    let events = state.audit.read().list(event_type, query.limit);
    let count = events.len();
    Ok(Json(EventsResponse { events, count }))
}

async fn get_event(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<Event> {
    let event = state.audit.read().get(id)?.clone();
    Ok(Json(event))
}

#[derive(Serialize)]
struct LedgerStatus {
    event_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    merkle_root: Option<String>,
}

async fn ledger_status(State(state): State<AppState>) -> ApiResult<LedgerStatus> {
    let audit = state.audit.read();
    let tree = MerkleTree::from_leaves(audit.event_hashes());
    Ok(Json(LedgerStatus {
        event_count: audit.len(),
        last_hash: audit.last_hash().map(str::to_string),
        merkle_root: tree.root().map(str::to_string),
    }))
}

async fn verify_ledger(State(state): State<AppState>) -> ApiResult<ChainVerification> {
    let verification = state.audit.read().verify_chain()?;
    Ok(Json(verification))
}

#[derive(Serialize)]
struct InclusionProofResponse {
    event_id: u64,
    leaf_hash: String,
    proof: Vec<ProofStep>,
    root: String,
}

async fn inclusion_proof(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<InclusionProofResponse> {
    let audit = state.audit.read();
    let leaf_hash = audit.get(id)?.hash.clone();
    let tree = MerkleTree::from_leaves(audit.event_hashes());
    let proof = tree.prove(id as usize)?;
    let root = tree
        .root()
        .map(str::to_string)
        .unwrap_or_default();
    Ok(Json(InclusionProofResponse {
        event_id: id,
        leaf_hash,
        proof,
        root,
    }))
}

#[derive(Deserialize)]
struct VerifyProofRequest {
    leaf_hash: String,
    proof: Vec<ProofStep>,
    root: String,
}

#[derive(Serialize)]
struct ProofVerdict {
    valid: bool,
}

async fn verify_inclusion_proof(Json(payload): Json<VerifyProofRequest>) -> Json<ProofVerdict> {
    Json(ProofVerdict {
        valid: MerkleTree::verify(&payload.leaf_hash, &payload.proof, &payload.root),
    })
}

#[derive(Serialize)]
struct ResetResponse {
    status: &'static str,
}

async fn demo_reset(State(state): State<AppState>) -> ApiResult<ResetResponse> {
    state.audit.write().reset()?;
    Ok(Json(ResetResponse { status: "reset" }))
}

#[derive(Serialize)]
struct PopulateResponse {
    created: usize,
    event_count: usize,
}

async fn demo_populate(State(state): State<AppState>) -> ApiResult<PopulateResponse> {
    let seeds: [(EventType, &str, Value); 8] = [
        (
            EventType::TrainingStarted,
            "Training run started for atlas-9b",
            json!({"model_id": "atlas-9b", "compute": "2.1e25 FLOP"}),
        ),
        (
            EventType::TrainingCompleted,
            "Training run completed for atlas-9b",
            json!({"model_id": "atlas-9b", "checkpoints": 12}),
        ),
        (
            EventType::SafetyEvalRun,
            "Autonomy eval suite executed",
            json!({"model_id": "atlas-9b", "suite": "autonomy-v3"}),
        ),
        (
            EventType::SafetyEvalPassed,
            "Autonomy eval suite passed",
            json!({"model_id": "atlas-9b", "suite": "autonomy-v3", "score": 0.97}),
        ),
        (
            EventType::SafetyEvalRun,
            "Cyber capability eval executed",
            json!({"model_id": "atlas-9b", "suite": "cyber-v2"}),
        ),
        (
            EventType::SafetyEvalFailed,
            "Cyber capability eval above threshold, mitigations required",
            json!({"model_id": "atlas-9b", "suite": "cyber-v2", "score": 0.41}),
        ),
        (
            EventType::IncidentReported,
            "Sandbox escape attempt observed during red teaming",
            json!({"model_id": "atlas-9b", "severity": "medium"}),
        ),
        (
            EventType::ModelDeployed,
            "atlas-9b deployed to production with mitigations",
            json!({"model_id": "atlas-9b", "deployment_id": "atlas-9b-prod"}),
        ),
    ];

    let mut audit = state.audit.write();
    for (event_type, description, metadata) in seeds {
        let metadata = match metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        audit.append(event_type, description, metadata)?;
    }
    Ok(Json(PopulateResponse {
        created: 8,
        event_count: audit.len(),
    }))
}

#[derive(Deserialize)]
struct TamperRequest {
    event_id: u64,
    field: String,
    new_value: Value,
}

#[derive(Serialize)]
struct TamperResponse {
    event: Event,
    warning: &'static str,
}

async fn demo_tamper(
    State(state): State<AppState>,
    Json(payload): Json<TamperRequest>,
) -> ApiResult<TamperResponse> {
    let event = state
        .audit
        .write()
        .tamper(payload.event_id, &payload.field, payload.new_value)?;
    Ok(Json(TamperResponse {
        event,
        warning: "stored hash was NOT recomputed; GET /verify will now report this event",
    }))
}

// ============================================================================
// TRANSPARENCY ENDPOINTS
// ============================================================================

#[derive(Deserialize)]
struct AnonymousIdRequest {
    identity: String,
    salt: String,
}

#[derive(Serialize)]
struct AnonymousIdResponse {
    anon_id: String,
    note: &'static str,
}

/// Deprecated helper: clients should derive the id locally so the identity
/// never crosses the wire. Nothing from the request is stored.
async fn derive_anonymous_id(
    Json(payload): Json<AnonymousIdRequest>,
) -> ApiResult<AnonymousIdResponse> {
    if payload.identity.is_empty() || payload.salt.is_empty() {
        return Err(LedgerError::Validation("identity and salt must not be empty".into()).into());
    }
    Ok(Json(AnonymousIdResponse {
        anon_id: anonymous_id(&payload.identity, &payload.salt),
        note: "deprecated: derive the anonymous id client-side",
    }))
}

#[derive(Deserialize)]
struct CreateConcernRequest {
    anon_id: String,
    title: String,
    description: String,
    target: String,
}

async fn create_concern(
    State(state): State<AppState>,
    Json(payload): Json<CreateConcernRequest>,
) -> ApiResult<Concern> {
    let mut transparency = state.transparency.write();
    let mut audit = state.audit.write();
    let concern = transparency.raise_concern(
        &mut audit,
        &payload.anon_id,
        &payload.title,
        &payload.description,
        &payload.target,
    )?;
    Ok(Json(concern))
}

#[derive(Deserialize)]
struct ConcernsQuery {
    status: Option<String>,
}

#[derive(Serialize)]
struct ConcernsResponse {
    concerns: Vec<Concern>,
    count: usize,
}

async fn list_concerns(
    State(state): State<AppState>,
    Query(query): Query<ConcernsQuery>,
) -> ApiResult<ConcernsResponse> {
    let status = query
        .status
        .as_deref()
        .map(ConcernStatus::parse)
        .transpose()?;
    let concerns = state.transparency.read().concerns(status);
    let count = concerns.len();
    Ok(Json(ConcernsResponse { concerns, count }))
}

#[derive(Serialize)]
struct ConcernDetail {
    concern: Concern,
    responses: Vec<ConcernResponse>,
}

async fn get_concern(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ConcernDetail> {
    let transparency = state.transparency.read();
    let concern = transparency.concern(&id)?.clone();
    let responses = transparency.responses_for(&id);
    Ok(Json(ConcernDetail { concern, responses }))
}

#[derive(Deserialize)]
struct CreateResponseRequest {
    concern_id: String,
    responder_role: String,
    content: String,
}

async fn create_response(
    State(state): State<AppState>,
    Json(payload): Json<CreateResponseRequest>,
) -> ApiResult<ConcernResponse> {
    let role = ResponderRole::parse(&payload.responder_role)?;
    let mut transparency = state.transparency.write();
    let mut audit = state.audit.write();
    let response = transparency.respond(&mut audit, &payload.concern_id, role, &payload.content)?;
    Ok(Json(response))
}

async fn dispute_concern(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Concern> {
    let mut transparency = state.transparency.write();
    let mut audit = state.audit.write();
    let concern = transparency.dispute(&mut audit, &id)?;
    Ok(Json(concern))
}

#[derive(Deserialize)]
struct CreateResolutionRequest {
    concern_id: String,
    outcome: String,
    notes: String,
}

async fn create_resolution(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateResolutionRequest>,
) -> ApiResult<Resolution> {
    let auditor = authenticated_with_role(&state, &headers, Role::Auditor)?;
    let outcome = ResolutionOutcome::parse(&payload.outcome)?;

    let mut transparency = state.transparency.write();
    let mut audit = state.audit.write();
    let resolution = transparency.resolve(
        &mut audit,
        &payload.concern_id,
        &auditor.party_id,
        outcome,
        &payload.notes,
    )?;
    Ok(Json(resolution))
}

async fn transparency_stats(State(state): State<AppState>) -> ApiResult<TransparencyStats> {
    Ok(Json(state.transparency.read().stats()))
}

// ============================================================================
// COMPLIANCE ENDPOINTS
// ============================================================================

#[derive(Deserialize)]
struct CreateSubmissionRequest {
    deployment_id: String,
    model_id: String,
    template_type: String,
    title: String,
    evidence_hash: String,
}

async fn create_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateSubmissionRequest>,
) -> ApiResult<ComplianceSubmission> {
    let lab = authenticated_with_role(&state, &headers, Role::Lab)?;
    let template_type = TemplateType::parse(&payload.template_type)?;

    let mut transparency = state.transparency.write();
    let mut audit = state.audit.write();
    let submission = transparency.submit_compliance(
        &mut audit,
        &lab.party_id,
        &payload.deployment_id,
        &payload.model_id,
        template_type,
        &payload.title,
        &payload.evidence_hash,
    )?;
    Ok(Json(submission))
}

#[derive(Deserialize)]
struct SubmissionsQuery {
    status: Option<String>,
    template_type: Option<String>,
    deployment_id: Option<String>,
}

#[derive(Serialize)]
struct SubmissionsResponse {
    submissions: Vec<ComplianceSubmission>,
    count: usize,
}

async fn list_submissions(
    State(state): State<AppState>,
    Query(query): Query<SubmissionsQuery>,
) -> ApiResult<SubmissionsResponse> {
    let status = query
        .status
        .as_deref()
        .map(SubmissionStatus::parse)
        .transpose()?;
    let template_type = query
        .template_type
        .as_deref()
        .map(TemplateType::parse)
        .transpose()?;
    let submissions =
        state
            .transparency
            .read()
            .submissions(status, template_type, query.deployment_id.as_deref());
    let count = submissions.len();
    Ok(Json(SubmissionsResponse { submissions, count }))
}

async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ComplianceSubmission> {
    let submission = state.transparency.read().submission(&id)?.clone();
    Ok(Json(submission))
}

#[derive(Deserialize)]
struct ReviewRequest {
    submission_id: String,
    decision: String,
    #[serde(default)]
    notes: String,
}

async fn review_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<ComplianceSubmission> {
    authenticated_with_role(&state, &headers, Role::Auditor)?;
    let decision = ReviewDecision::parse(&payload.decision)?;

    let mut transparency = state.transparency.write();
    let mut audit = state.audit.write();
    let submission =
        transparency.review(&mut audit, &payload.submission_id, decision, &payload.notes)?;
    Ok(Json(submission))
}

#[derive(Deserialize)]
struct DeploymentStatusQuery {
    model_id: Option<String>,
}

async fn deployment_status(
    State(state): State<AppState>,
    Path(deployment_id): Path<String>,
    Query(query): Query<DeploymentStatusQuery>,
) -> ApiResult<DeploymentComplianceStatus> {
    let model_id = query
        .model_id
        .ok_or_else(|| LedgerError::Validation("model_id query parameter is required".into()))?;
    let status = state.transparency.read().deployment_status(
        &deployment_id,
        &model_id,
        &state.config.gate.required_templates,
    );
    Ok(Json(status))
}

#[derive(Serialize)]
struct TemplatesResponse {
    templates: Vec<TemplateCatalogEntry>,
}

async fn list_templates(State(state): State<AppState>) -> ApiResult<TemplatesResponse> {
    Ok(Json(TemplatesResponse {
        templates: template_catalog(&state.config.gate.required_templates),
    }))
}

#[derive(Serialize)]
struct CompliancePopulateResponse {
    deployment_id: &'static str,
    model_id: &'static str,
    submissions: Vec<String>,
    concerns: Vec<String>,
}

/// Seed a demo deployment: two verified submissions, one still awaiting
/// review, and one open concern so the gate has something to block on.
async fn demo_compliance_populate(
    State(state): State<AppState>,
) -> ApiResult<CompliancePopulateResponse> {
    let deployment_id = "atlas-9b-prod";
    let model_id = "atlas-9b";

    let mut transparency = state.transparency.write();
    let mut audit = state.audit.write();

    let mut submission_ids = Vec::new();
    let seeds = [
        (TemplateType::SafetyEvaluation, "Safety evaluation results for atlas-9b"),
        (TemplateType::CapabilityAssessment, "Dangerous capability assessment for atlas-9b"),
        (TemplateType::RedTeamReport, "Independent red-team findings for atlas-9b"),
    ];
    for (template_type, title) in seeds {
        let evidence_hash = crate::crypto::sha256_hex(title.as_bytes());
        let submission = transparency.submit_compliance(
            &mut audit,
            "demo-lab",
            deployment_id,
            model_id,
            template_type,
            title,
            &evidence_hash,
        )?;
        submission_ids.push(submission.id);
    }
    for id in &submission_ids[..2] {
        transparency.review(&mut audit, id, ReviewDecision::Verify, "demo verification")?;
    }

    let concern = transparency.raise_concern(
        &mut audit,
        &anonymous_id("demo-reporter", "demo-salt"),
        "Red-team report omits sandbox escape finding",
        "The filed red-team report does not mention the observed sandbox escape attempt.",
        deployment_id,
    )?;

    Ok(Json(CompliancePopulateResponse {
        deployment_id,
        model_id,
        submissions: submission_ids,
        concerns: vec![concern.id],
    }))
}

// ============================================================================
// ZK ENDPOINTS
// ============================================================================

#[derive(Deserialize)]
struct CreateCommitmentRequest {
    count: u64,
    #[serde(default)]
    blinding: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

async fn create_commitment(
    State(state): State<AppState>,
    Json(payload): Json<CreateCommitmentRequest>,
) -> ApiResult<IssuedCommitment> {
    let issued = state.zk.write().commit(
        payload.count,
        payload.blinding,
        payload.metadata.unwrap_or(Value::Null),
    )?;
    Ok(Json(issued))
}

async fn get_commitment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ZkCommitment> {
    let commitment = state.zk.read().commitment(&id)?.clone();
    Ok(Json(commitment))
}

#[derive(Deserialize)]
struct ProveRequest {
    commitment_id: String,
    threshold: u64,
}

async fn create_proof(
    State(state): State<AppState>,
    Json(payload): Json<ProveRequest>,
) -> ApiResult<ZkProof> {
    let proof = state
        .zk
        .write()
        .prove(&payload.commitment_id, payload.threshold)?;
    Ok(Json(proof))
}

#[derive(Deserialize)]
struct VerifyZkRequest {
    commitment_id: String,
    threshold: u64,
    proof_value: String,
}

async fn verify_zk_proof(
    State(state): State<AppState>,
    Json(payload): Json<VerifyZkRequest>,
) -> ApiResult<ZkVerification> {
    let verification =
        state
            .zk
            .read()
            .verify(&payload.commitment_id, payload.threshold, &payload.proof_value)?;
    Ok(Json(verification))
}

// ============================================================================
// AUTH ENDPOINTS
// ============================================================================

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    role: String,
}

async fn register_party(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<RegisteredKey> {
    let role = Role::parse(&payload.role)?;
    let client = client_addr(&headers, connect_info.as_ref());
    let issued = state.auth.write().register(&payload.name, role, &client)?;
    Ok(Json(issued))
}

#[derive(Serialize)]
struct PartiesResponse {
    parties: Vec<PartyInfo>,
    count: usize,
}

async fn list_parties(State(state): State<AppState>) -> ApiResult<PartiesResponse> {
    let parties = state.auth.read().parties();
    let count = parties.len();
    Ok(Json(PartiesResponse { parties, count }))
}

async fn revoke_party(
    State(state): State<AppState>,
    Path(party_id): Path<String>,
) -> ApiResult<PartyInfo> {
    let info = state.auth.write().revoke(&party_id)?;
    Ok(Json(info))
}

async fn whoami(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<PartyInfo> {
    let party = authenticated(&state, &headers)?;
    Ok(Json(PartyInfo::from(&party)))
}

#[derive(Serialize)]
struct RotatedKeyResponse {
    party_id: String,
    api_key: String,
}

async fn rotate_key(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<RotatedKeyResponse> {
    let party = authenticated(&state, &headers)?;
    let api_key = state.auth.write().rotate(&party.party_id)?;
    Ok(Json(RotatedKeyResponse {
        party_id: party.party_id,
        api_key,
    }))
}

async fn demo_auth_reset(State(state): State<AppState>) -> ApiResult<ResetResponse> {
    state.auth.write().reset()?;
    Ok(Json(ResetResponse { status: "reset" }))
}

// ============================================================================
// MIRROR ENDPOINTS
// ============================================================================

#[derive(Serialize)]
struct MirrorStatusResponse {
    parties: Vec<MirrorStatus>,
}

async fn mirror_sync(State(state): State<AppState>) -> ApiResult<MirrorStatusResponse> {
    let records = state.transparency.read().mirror_records()?;
    let parties = state.mirror.write().sync_all(records)?;
    Ok(Json(MirrorStatusResponse { parties }))
}

async fn mirror_status(State(state): State<AppState>) -> ApiResult<MirrorStatusResponse> {
    Ok(Json(MirrorStatusResponse {
        parties: state.mirror.read().status(),
    }))
}

async fn mirror_compare(State(state): State<AppState>) -> ApiResult<MirrorComparison> {
    Ok(Json(state.mirror.read().compare()))
}

#[derive(Deserialize)]
struct MirrorTamperRequest {
    party: String,
    record_type: String,
    record_id: String,
    field: String,
    new_value: Value,
}

#[derive(Serialize)]
struct MirrorTamperResponse {
    party: MirrorParty,
    record_id: String,
    field: String,
    warning: &'static str,
}

async fn mirror_tamper(
    State(state): State<AppState>,
    Json(payload): Json<MirrorTamperRequest>,
) -> ApiResult<MirrorTamperResponse> {
    let party = MirrorParty::parse(&payload.party)?;
    state.mirror.write().tamper(
        party,
        &payload.record_type,
        &payload.record_id,
        &payload.field,
        payload.new_value,
    )?;
    Ok(Json(MirrorTamperResponse {
        party,
        record_id: payload.record_id,
        field: payload.field,
        warning: "content hash was NOT recomputed; GET /demo/mirror/detect will report this party",
    }))
}

async fn mirror_detect(State(state): State<AppState>) -> ApiResult<MirrorDetection> {
    let detection = state.mirror.read().detect()?;
    Ok(Json(detection))
}

async fn mirror_reset(State(state): State<AppState>) -> ApiResult<ResetResponse> {
    state.mirror.write().reset()?;
    Ok(Json(ResetResponse { status: "reset" }))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events", post(create_event).get(list_events))
        .route("/events/:id", get(get_event))
        .route("/status", get(ledger_status))
        .route("/verify", get(verify_ledger))
        .route("/proof/verify", post(verify_inclusion_proof))
        .route("/proof/:id", get(inclusion_proof))
        .route("/demo/reset", post(demo_reset))
        .route("/demo/populate", post(demo_populate))
        .route("/demo/tamper", post(demo_tamper))
        .route("/transparency/anonymous-id", post(derive_anonymous_id))
        .route(
            "/transparency/concerns",
            post(create_concern).get(list_concerns),
        )
        .route("/transparency/concerns/:id", get(get_concern))
        .route("/transparency/concerns/:id/dispute", post(dispute_concern))
        .route("/transparency/responses", post(create_response))
        .route("/transparency/resolutions", post(create_resolution))
        .route("/transparency/stats", get(transparency_stats))
        .route(
            "/compliance/submissions",
            post(create_submission).get(list_submissions),
        )
        .route("/compliance/submissions/:id", get(get_submission))
        .route("/compliance/review", post(review_submission))
        .route("/compliance/status/:deployment_id", get(deployment_status))
        .route("/compliance/templates", get(list_templates))
        .route("/demo/compliance-populate", post(demo_compliance_populate))
        .route("/zk/commitment", post(create_commitment))
        .route("/zk/commitment/:id", get(get_commitment))
        .route("/zk/prove", post(create_proof))
        .route("/zk/verify", post(verify_zk_proof))
        .route("/auth/register", post(register_party))
        .route("/auth/parties", get(list_parties))
        .route("/auth/parties/:party_id", delete(revoke_party))
        .route("/auth/me", get(whoami))
        .route("/auth/rotate-key", post(rotate_key))
        .route("/demo/auth-reset", post(demo_auth_reset))
        .route("/demo/mirror/sync", post(mirror_sync))
        .route("/demo/mirror/status", get(mirror_status))
        .route("/demo/mirror/compare", get(mirror_compare))
        .route("/demo/mirror/tamper", post(mirror_tamper))
        .route("/demo/mirror/detect", get(mirror_detect))
        .route("/demo/mirror/reset", post(mirror_reset))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, bind: &str, port: u16) -> std::io::Result<()> {
    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "transparency ledger API listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
