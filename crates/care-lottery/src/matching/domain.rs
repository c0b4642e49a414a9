use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a registered patient, professional, or administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Identifier of a lottery pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrollmentId(pub u64);

/// Identifier of a care engagement created by a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngagementId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EngagementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role claim carried by an authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Professional,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "patient" | "paciente" => Some(Self::Patient),
            "professional" | "profissional" => Some(Self::Professional),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Professional => "professional",
            Role::Admin => "admin",
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub const fn patient(id: u64) -> Self {
        Self {
            id: UserId(id),
            role: Role::Patient,
        }
    }

    pub const fn professional(id: u64) -> Self {
        Self {
            id: UserId(id),
            role: Role::Professional,
        }
    }

    pub const fn admin(id: u64) -> Self {
        Self {
            id: UserId(id),
            role: Role::Admin,
        }
    }
}

/// Body of an enrollment request. Missing fields deserialize as empty and are rejected later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub municipality: String,
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub description: String,
}

/// Status of a pool entry. Moves forward only; a requeue creates a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    AwaitingDraw,
    DrawnInProgress,
    CancelledByPatient,
    CancelledByProfessional,
    CompletedByProfessional,
    Confirmed,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 6] = [
        EnrollmentStatus::AwaitingDraw,
        EnrollmentStatus::DrawnInProgress,
        EnrollmentStatus::CancelledByPatient,
        EnrollmentStatus::CancelledByProfessional,
        EnrollmentStatus::CompletedByProfessional,
        EnrollmentStatus::Confirmed,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            EnrollmentStatus::AwaitingDraw => "awaiting_draw",
            EnrollmentStatus::DrawnInProgress => "drawn_in_progress",
            EnrollmentStatus::CancelledByPatient => "cancelled_by_patient",
            EnrollmentStatus::CancelledByProfessional => "cancelled_by_professional",
            EnrollmentStatus::CompletedByProfessional => "completed_by_professional",
            EnrollmentStatus::Confirmed => "confirmed",
        }
    }

    /// Open entries count against the one-active-enrollment-per-slot rule.
    pub const fn is_open(self) -> bool {
        matches!(
            self,
            EnrollmentStatus::AwaitingDraw | EnrollmentStatus::DrawnInProgress
        )
    }
}

/// A patient's standing request for a specialty in a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub patient_id: UserId,
    pub professional_id: Option<UserId>,
    pub specialty: String,
    pub state: String,
    pub municipality: String,
    /// Need description frozen at enrollment time.
    pub description: String,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub renewed_at: Option<DateTime<Utc>>,
    pub drawn_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancelled_by_patient_at: Option<DateTime<Utc>>,
    pub cancelled_by_professional_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub origin_enrollment_id: Option<EnrollmentId>,
}

impl Enrollment {
    /// Entries without an expiry never lapse.
    pub fn is_unexpired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }

    pub fn occupies_slot(
        &self,
        patient_id: UserId,
        specialty: &str,
        state: &str,
        municipality: &str,
    ) -> bool {
        self.patient_id == patient_id
            && self.specialty == specialty
            && self.state == state
            && self.municipality == municipality
    }

    pub fn blocks_new_enrollment(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && self.is_unexpired(now)
    }

    pub fn is_drawable(&self, now: DateTime<Utc>) -> bool {
        self.status == EnrollmentStatus::AwaitingDraw && self.is_unexpired(now)
    }
}

/// Status of an engagement between one patient and one professional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementStatus {
    Active,
    CompletedByProfessional,
    ConfirmedByPatient,
    CancelledByPatient,
    CancelledByProfessional,
    CompletedUnconfirmed,
}

impl EngagementStatus {
    pub const ALL: [EngagementStatus; 6] = [
        EngagementStatus::Active,
        EngagementStatus::CompletedByProfessional,
        EngagementStatus::ConfirmedByPatient,
        EngagementStatus::CancelledByPatient,
        EngagementStatus::CancelledByProfessional,
        EngagementStatus::CompletedUnconfirmed,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            EngagementStatus::Active => "active",
            EngagementStatus::CompletedByProfessional => "completed_by_professional",
            EngagementStatus::ConfirmedByPatient => "confirmed_by_patient",
            EngagementStatus::CancelledByPatient => "cancelled_by_patient",
            EngagementStatus::CancelledByProfessional => "cancelled_by_professional",
            EngagementStatus::CompletedUnconfirmed => "completed_unconfirmed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(
            self,
            EngagementStatus::Active | EngagementStatus::CompletedByProfessional
        )
    }
}

/// An active or concluded care relationship created by a draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub id: EngagementId,
    /// Explicit link to the consumed pool entry. Older rows may lack it.
    #[serde(default)]
    pub enrollment_id: Option<EnrollmentId>,
    pub professional_id: UserId,
    pub patient_id: UserId,
    pub specialty: String,
    pub status: EngagementStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cancellation_justification: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Engagement {
    pub fn involves(&self, actor: &Actor) -> bool {
        match actor.role {
            Role::Patient => self.patient_id == actor.id,
            Role::Professional => self.professional_id == actor.id,
            Role::Admin => false,
        }
    }
}

/// Operations that move an enrollment or engagement between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateAction {
    Renew,
    Withdraw,
    Cancel,
    Complete,
    Confirm,
}

impl fmt::Display for StateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StateAction::Renew => "renew",
            StateAction::Withdraw => "withdraw",
            StateAction::Cancel => "cancel",
            StateAction::Complete => "complete",
            StateAction::Confirm => "confirm",
        };
        f.write_str(label)
    }
}
