use serde::{Deserialize, Serialize};

use super::submission::SubmissionRecord;

const LEGACY_DISPLAY_PREFIX: &str = "NDN-";
const QR_SIZE_PX: u32 = 100;

/// Public link that resolves an identifier on the verification page.
pub fn verification_url(base_url: &str, identifier: &str) -> String {
    format!("{}/verify?ndn={}", base_url.trim_end_matches('/'), identifier)
}

/// PDF file name: student name with whitespace runs replaced by `_`,
/// followed by the identifier.
pub fn pdf_filename(student_name: &str, identifier: &str) -> String {
    let name = student_name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("NERD_Clearance_{name}_{identifier}.pdf")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    M,
    Q,
    H,
}

/// Input for the QR image generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    pub text: String,
    pub width: u32,
    pub height: u32,
    pub error_correction: ErrorCorrection,
    pub color_dark: String,
    pub color_light: String,
}

impl QrPayload {
    pub fn for_url(url: &str) -> Self {
        Self {
            text: url.to_string(),
            width: QR_SIZE_PX,
            height: QR_SIZE_PX,
            error_correction: ErrorCorrection::M,
            color_dark: "#000000".to_string(),
            color_light: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Layout handed to the snapshot-to-PDF exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfExportOptions {
    pub filename: String,
    /// top, right, bottom, left
    pub margins_mm: [u32; 4],
    pub unit: String,
    pub format: String,
    pub orientation: Orientation,
    pub scale: u32,
    pub image_type: String,
    pub background: String,
}

impl PdfExportOptions {
    pub fn a4_portrait(filename: String) -> Self {
        Self {
            filename,
            margins_mm: [15, 15, 15, 15],
            unit: "mm".to_string(),
            format: "a4".to_string(),
            orientation: Orientation::Portrait,
            scale: 2,
            image_type: "png".to_string(),
            background: "#ffffff".to_string(),
        }
    }
}

/// Everything the certificate view shows, derived from a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub identifier: String,
    pub display_identifier: String,
    pub title: String,
    pub student_name: String,
    pub institution: String,
    pub faculty: String,
    pub department: String,
    pub submission_type: String,
    pub submission_date: String,
    pub compliance_status: String,
    pub academic_report_status: String,
    pub contribution_amount: String,
    pub verification_url: String,
    pub qr: QrPayload,
    pub pdf: PdfExportOptions,
}

impl Certificate {
    pub fn from_record(record: &SubmissionRecord, base_url: &str) -> Self {
        let url = verification_url(base_url, &record.identifier);

        Self {
            identifier: record.identifier.clone(),
            display_identifier: record
                .identifier
                .strip_prefix(LEGACY_DISPLAY_PREFIX)
                .unwrap_or(&record.identifier)
                .to_string(),
            title: record.title.clone(),
            student_name: record.student_name.clone(),
            institution: record.institution.clone(),
            faculty: record.faculty.clone(),
            department: record.department.clone(),
            submission_type: record.submission_type.clone(),
            submission_date: record
                .submission_timestamp
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            compliance_status: record.compliance_status.clone(),
            academic_report_status: record.academic_report_status.clone(),
            contribution_amount: record.contribution_amount.clone(),
            qr: QrPayload::for_url(&url),
            pdf: PdfExportOptions::a4_portrait(pdf_filename(
                &record.student_name,
                &record.identifier,
            )),
            verification_url: url,
        }
    }
}
