//! Compliance submissions, review, and the deployment gate.
//!
//! Labs file submissions against required templates; an auditor reviews
//! them to `verified` or `rejected`. The deployment gate clears a release
//! only when every required template has a verified submission and no
//! concern targeting the deployment remains unresolved.
//!
//! Submission state machine:
//!
//! ```text
//! submitted --[begin_review]--> under_review --[verify|reject]--> verified | rejected
//! submitted --------------------[verify|reject]----------------> verified | rejected
//! ```
//!
//! Both terminal states are final; a rejected submission is superseded only
//! by filing a new one under the same template.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::concern::Concern;
use crate::error::{LedgerError, Result};

/// Evidence templates a lab can file against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    SafetyEvaluation,
    TrainingData,
    CapabilityAssessment,
    RedTeamReport,
    HumanOversight,
    IncidentReport,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::SafetyEvaluation => "safety_evaluation",
            TemplateType::TrainingData => "training_data",
            TemplateType::CapabilityAssessment => "capability_assessment",
            TemplateType::RedTeamReport => "red_team_report",
            TemplateType::HumanOversight => "human_oversight",
            TemplateType::IncidentReport => "incident_report",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| LedgerError::Validation(format!("unknown template_type '{s}'")))
    }

    pub fn all() -> [TemplateType; 6] {
        [
            TemplateType::SafetyEvaluation,
            TemplateType::TrainingData,
            TemplateType::CapabilityAssessment,
            TemplateType::RedTeamReport,
            TemplateType::HumanOversight,
            TemplateType::IncidentReport,
        ]
    }

    fn description(&self) -> &'static str {
        match self {
            TemplateType::SafetyEvaluation => {
                "Results of pre-deployment safety evaluations against the agreed benchmark suite"
            }
            TemplateType::TrainingData => {
                "Provenance and filtering documentation for the training corpus"
            }
            TemplateType::CapabilityAssessment => {
                "Assessment of dangerous-capability thresholds for the deployed model"
            }
            TemplateType::RedTeamReport => {
                "Findings and mitigations from independent red-team exercises"
            }
            TemplateType::HumanOversight => {
                "Description of human oversight and override mechanisms in operation"
            }
            TemplateType::IncidentReport => {
                "Post-incident analysis filed after a deployment incident"
            }
        }
    }
}

/// Gate default: the templates every deployment must have verified.
pub const DEFAULT_REQUIRED_TEMPLATES: [TemplateType; 3] = [
    TemplateType::SafetyEvaluation,
    TemplateType::CapabilityAssessment,
    TemplateType::RedTeamReport,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    UnderReview,
    Verified,
    Rejected,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Verified | SubmissionStatus::Rejected)
    }

    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| LedgerError::Validation(format!("unknown submission status '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Verify,
    Reject,
}

impl ReviewDecision {
    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| LedgerError::Validation(format!("unknown review decision '{s}'")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceSubmission {
    pub id: String,
    pub lab_id: String,
    pub deployment_id: String,
    pub model_id: String,
    pub template_type: TemplateType,
    pub title: String,
    /// Digest of the evidence package, asserted by the submitting lab; the
    /// evidence itself never enters the ledger.
    pub evidence_hash: String,
    pub status: SubmissionStatus,
    pub submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_notes: Option<String>,
}

/// One entry of the template catalog served to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateCatalogEntry {
    pub template_type: TemplateType,
    pub description: String,
    pub required_for_deployment: bool,
}

pub fn template_catalog(required: &[TemplateType]) -> Vec<TemplateCatalogEntry> {
    TemplateType::all()
        .iter()
        .map(|t| TemplateCatalogEntry {
            template_type: *t,
            description: t.description().to_string(),
            required_for_deployment: required.contains(t),
        })
        .collect()
}

/// Per-template verdict inside a gate evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRequirement {
    pub template_type: TemplateType,
    pub satisfied: bool,
    /// The submission that determined the verdict: the latest non-rejected
    /// one for this template, when any exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_status: Option<SubmissionStatus>,
}

/// The deployment gate's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentComplianceStatus {
    pub deployment_id: String,
    pub model_id: String,
    pub required_templates: Vec<TemplateRequirement>,
    /// Ids of open/responded/disputed concerns referencing the deployment.
    pub unresolved_concerns: Vec<String>,
    pub cleared: bool,
    pub blocking: Vec<String>,
}

/// Evaluate the deployment gate.
///
/// Requirement satisfaction is decided by the latest non-rejected submission
/// for each `(deployment_id, model_id, template)` triple; rejected
/// submissions stay in the record but never satisfy a requirement. A concern
/// references the deployment when its target contains the deployment id or
/// names one of the deployment's submissions.
pub fn evaluate_deployment(
    submissions: &[ComplianceSubmission],
    concerns: &[Concern],
    deployment_id: &str,
    model_id: &str,
    required: &[TemplateType],
) -> DeploymentComplianceStatus {
    let deployment_submissions: Vec<&ComplianceSubmission> = submissions
        .iter()
        .filter(|s| s.deployment_id == deployment_id && s.model_id == model_id)
        .collect();

    let mut required_templates = Vec::with_capacity(required.len());
    let mut blocking = Vec::new();

    for template in required {
        // Submissions are stored in filing order, so the last non-rejected
        // one is the latest.
        let governing = deployment_submissions
            .iter()
            .filter(|s| s.template_type == *template && s.status != SubmissionStatus::Rejected)
            .last();

        let satisfied = governing.map_or(false, |s| s.status == SubmissionStatus::Verified);
        if !satisfied {
            blocking.push(format!(
                "required template {} has no verified submission",
                template.as_str()
            ));
        }
        required_templates.push(TemplateRequirement {
            template_type: *template,
            satisfied,
            submission_id: governing.map(|s| s.id.clone()),
            submission_status: governing.map(|s| s.status),
        });
    }

    let submission_ids: Vec<&str> = deployment_submissions.iter().map(|s| s.id.as_str()).collect();
    let unresolved_concerns: Vec<String> = concerns
        .iter()
        .filter(|c| c.is_unresolved())
        .filter(|c| {
            c.target.contains(deployment_id) || submission_ids.contains(&c.target.as_str())
        })
        .map(|c| c.id.clone())
        .collect();

    if !unresolved_concerns.is_empty() {
        let n = unresolved_concerns.len();
        blocking.push(format!(
            "{n} unresolved concern{}",
            if n == 1 { "" } else { "s" }
        ));
    }

    DeploymentComplianceStatus {
        deployment_id: deployment_id.to_string(),
        model_id: model_id.to_string(),
        cleared: blocking.is_empty(),
        required_templates,
        unresolved_concerns,
        blocking,
    }
}
