use std::collections::BTreeMap;

use super::domain::{EngagementStatus, EnrollmentStatus};

/// Human-readable labels for status codes, built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLabels {
    entries: BTreeMap<&'static str, &'static str>,
}

impl StatusLabels {
    pub fn standard() -> Self {
        let mut entries = BTreeMap::new();
        for status in EnrollmentStatus::ALL {
            entries.insert(status.code(), enrollment_label(status));
        }
        for status in EngagementStatus::ALL {
            entries.insert(status.code(), engagement_label(status));
        }
        Self { entries }
    }

    /// Unknown codes fall back to the code itself.
    pub fn label<'a>(&'a self, code: &'a str) -> &'a str {
        self.entries.get(code).copied().unwrap_or(code)
    }

    pub fn enrollment(&self, status: EnrollmentStatus) -> &str {
        self.label(status.code())
    }

    pub fn engagement(&self, status: EngagementStatus) -> &str {
        self.label(status.code())
    }
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self::standard()
    }
}

const fn enrollment_label(status: EnrollmentStatus) -> &'static str {
    match status {
        EnrollmentStatus::AwaitingDraw => "Awaiting draw",
        EnrollmentStatus::DrawnInProgress => "In care",
        EnrollmentStatus::CancelledByPatient => "Cancelled by patient",
        EnrollmentStatus::CancelledByProfessional => "Cancelled by professional",
        EnrollmentStatus::CompletedByProfessional => "Awaiting completion confirmation",
        EnrollmentStatus::Confirmed => "Completed",
    }
}

const fn engagement_label(status: EngagementStatus) -> &'static str {
    match status {
        EngagementStatus::Active => "In care",
        EngagementStatus::CompletedByProfessional => "Awaiting completion confirmation",
        EngagementStatus::ConfirmedByPatient => "Completed",
        EngagementStatus::CancelledByPatient => "Cancelled by patient",
        EngagementStatus::CancelledByProfessional => "Cancelled by professional",
        EngagementStatus::CompletedUnconfirmed => "Completed without confirmation",
    }
}
