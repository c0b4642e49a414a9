//! JSON read models returned by the HTTP surface.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::directory::PatientProfile;
use super::domain::{Engagement, EngagementId, Enrollment, EnrollmentId, UserId};
use super::labels::StatusLabels;
use super::service::{CancellationOutcome, DrawOutcome, EngagementDetail, EngagementSummary};

/// Fixed, sortable timestamp layout used by every view.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn optional_timestamp(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(timestamp)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentView {
    pub id: EnrollmentId,
    pub specialty: String,
    pub state: String,
    pub municipality: String,
    pub description: String,
    pub status: &'static str,
    pub status_label: String,
    pub enrolled_at: String,
    pub renewed_at: Option<String>,
    pub drawn_at: Option<String>,
    pub expires_at: Option<String>,
    pub origin_enrollment_id: Option<EnrollmentId>,
}

impl EnrollmentView {
    pub fn new(enrollment: &Enrollment, labels: &StatusLabels) -> Self {
        Self {
            id: enrollment.id,
            specialty: enrollment.specialty.clone(),
            state: enrollment.state.clone(),
            municipality: enrollment.municipality.clone(),
            description: enrollment.description.clone(),
            status: enrollment.status.code(),
            status_label: labels.enrollment(enrollment.status).to_string(),
            enrolled_at: timestamp(enrollment.enrolled_at),
            renewed_at: optional_timestamp(enrollment.renewed_at),
            drawn_at: optional_timestamp(enrollment.drawn_at),
            expires_at: optional_timestamp(enrollment.expires_at),
            origin_enrollment_id: enrollment.origin_enrollment_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngagementSummaryView {
    pub id: EngagementId,
    pub specialty: String,
    pub status: &'static str,
    pub status_label: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<String>,
    pub state: Option<String>,
    pub municipality: Option<String>,
}

impl EngagementSummaryView {
    fn build(
        engagement: &Engagement,
        enrollment: Option<&Enrollment>,
        counterpart: Option<String>,
        labels: &StatusLabels,
    ) -> Self {
        Self {
            id: engagement.id,
            specialty: engagement.specialty.clone(),
            status: engagement.status.code(),
            status_label: labels.engagement(engagement.status).to_string(),
            started_at: timestamp(engagement.started_at),
            ended_at: optional_timestamp(engagement.ended_at),
            counterpart,
            state: enrollment.map(|enrollment| enrollment.state.clone()),
            municipality: enrollment.map(|enrollment| enrollment.municipality.clone()),
        }
    }

    pub fn new(summary: &EngagementSummary, labels: &StatusLabels) -> Self {
        Self::build(
            &summary.engagement,
            summary.enrollment.as_ref(),
            summary.counterpart.clone(),
            labels,
        )
    }

    pub fn bare(engagement: &Engagement, labels: &StatusLabels) -> Self {
        Self::build(engagement, None, None, labels)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<&PatientProfile> for ContactView {
    fn from(patient: &PatientProfile) -> Self {
        Self {
            id: patient.id,
            name: patient.name.clone(),
            email: patient.email.clone(),
            phone: patient.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngagementDetailView {
    #[serde(flatten)]
    pub summary: EngagementSummaryView,
    /// Need description frozen at enrollment time.
    pub description: Option<String>,
    pub patient: Option<ContactView>,
    pub professional: Option<String>,
    pub cancellation_justification: Option<String>,
    pub confirmed_at: Option<String>,
}

impl EngagementDetailView {
    pub fn new(detail: &EngagementDetail, labels: &StatusLabels) -> Self {
        let engagement = &detail.engagement;
        Self {
            summary: EngagementSummaryView::build(
                engagement,
                detail.enrollment.as_ref(),
                None,
                labels,
            ),
            description: detail
                .enrollment
                .as_ref()
                .map(|enrollment| enrollment.description.clone()),
            patient: detail.patient.as_ref().map(ContactView::from),
            professional: detail
                .professional
                .as_ref()
                .map(|professional| professional.name.clone()),
            cancellation_justification: engagement.cancellation_justification.clone(),
            confirmed_at: optional_timestamp(engagement.confirmed_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawnPatientView {
    pub id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub description: String,
    pub enrollment_id: EnrollmentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawView {
    pub patient: DrawnPatientView,
    pub engagement: EngagementSummaryView,
}

impl DrawView {
    pub fn new(outcome: &DrawOutcome, labels: &StatusLabels) -> Self {
        let profile = outcome.patient.as_ref();
        Self {
            patient: DrawnPatientView {
                id: outcome.enrollment.patient_id,
                name: profile.map(|patient| patient.name.clone()),
                email: profile.map(|patient| patient.email.clone()),
                phone: profile.and_then(|patient| patient.phone.clone()),
                description: outcome.enrollment.description.clone(),
                enrollment_id: outcome.enrollment.id,
            },
            engagement: EngagementSummaryView::build(
                &outcome.engagement,
                Some(&outcome.enrollment),
                profile.map(|patient| patient.name.clone()),
                labels,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationView {
    pub engagement: EngagementSummaryView,
    pub requeued_enrollment: Option<EnrollmentView>,
}

impl CancellationView {
    pub fn new(outcome: &CancellationOutcome, labels: &StatusLabels) -> Self {
        Self {
            engagement: EngagementSummaryView::bare(&outcome.engagement, labels),
            requeued_enrollment: outcome
                .requeued
                .as_ref()
                .map(|enrollment| EnrollmentView::new(enrollment, labels)),
        }
    }
}
