use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::identifier::Ndn;

pub const DEFAULT_CONTRIBUTION: &str = "N/A (via Partner)";

/// Raw submission input as sent by the issuance form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub faculty: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub submission_type: String,
    #[serde(default, alias = "ncvs_compliance")]
    pub compliance_status: String,
    #[serde(default, alias = "academic_report")]
    pub academic_report_status: String,
    #[serde(default)]
    pub contribution: Option<String>,
}

impl SubmissionForm {
    /// Copy of the form with every field trimmed. A blank contribution
    /// becomes `None`.
    pub fn normalized(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            student_name: self.student_name.trim().to_string(),
            institution: self.institution.trim().to_string(),
            faculty: self.faculty.trim().to_string(),
            department: self.department.trim().to_string(),
            submission_type: self.submission_type.trim().to_string(),
            compliance_status: self.compliance_status.trim().to_string(),
            academic_report_status: self.academic_report_status.trim().to_string(),
            contribution: self
                .contribution
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }

    fn required_fields(&self) -> [(&'static str, &str); 8] {
        [
            ("title", &self.title),
            ("student_name", &self.student_name),
            ("institution", &self.institution),
            ("faculty", &self.faculty),
            ("department", &self.department),
            ("submission_type", &self.submission_type),
            ("compliance_status", &self.compliance_status),
            ("academic_report_status", &self.academic_report_status),
        ]
    }

    /// Lists every problem with the form. Empty means the form can be stored.
    pub fn validate(&self, options: &FieldOptions) -> Vec<String> {
        let mut problems: Vec<String> = self
            .required_fields()
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| format!("{name} is required"))
            .collect();

        let offered = [
            (
                "submission_type",
                self.submission_type.trim(),
                &options.submission_types,
            ),
            (
                "compliance_status",
                self.compliance_status.trim(),
                &options.compliance_statuses,
            ),
            (
                "academic_report_status",
                self.academic_report_status.trim(),
                &options.report_statuses,
            ),
        ];

        for (name, value, allowed) in offered {
            if !value.is_empty() && !allowed.is_empty() && !allowed.iter().any(|a| a == value) {
                problems.push(format!("{name} '{value}' is not an offered option"));
            }
        }

        problems
    }
}

/// Option sets offered for the select-style fields. An empty set accepts any
/// non-empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions {
    pub submission_types: Vec<String>,
    pub compliance_statuses: Vec<String>,
    pub report_statuses: Vec<String>,
}

/// The persisted submission. Serde names match the `submissions` table
/// columns so the same shape travels to either backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    #[serde(rename = "ndn")]
    pub identifier: String,
    pub title: String,
    pub student_name: String,
    pub institution: String,
    pub faculty: String,
    pub department: String,
    pub submission_type: String,
    #[serde(rename = "ncvs_compliance")]
    pub compliance_status: String,
    #[serde(rename = "academic_report")]
    pub academic_report_status: String,
    #[serde(rename = "submission_date")]
    pub submission_timestamp: DateTime<Utc>,
    pub contribution_amount: String,
    #[serde(
        rename = "certificate_image",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rendered_image: Option<String>,
}

impl SubmissionRecord {
    /// Builds a record from an already validated form.
    pub fn new(identifier: &Ndn, form: &SubmissionForm, submitted_at: DateTime<Utc>) -> Self {
        let form = form.normalized();

        Self {
            identifier: identifier.to_string(),
            title: form.title,
            student_name: form.student_name,
            institution: form.institution,
            faculty: form.faculty,
            department: form.department,
            submission_type: form.submission_type,
            compliance_status: form.compliance_status,
            academic_report_status: form.academic_report_status,
            // Stored text keeps millisecond precision
            submission_timestamp: submitted_at.trunc_subsecs(3),
            contribution_amount: form
                .contribution
                .unwrap_or_else(|| DEFAULT_CONTRIBUTION.to_string()),
            rendered_image: None,
        }
    }

    pub fn has_rendered_image(&self) -> bool {
        self.rendered_image.is_some()
    }
}
