//! Enrollment pool: eligibility, expiry, and requeue of lottery entries.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::domain::{
    Enrollment, EnrollmentId, EnrollmentRequest, EnrollmentStatus, StateAction, UserId,
};
use super::error::MatchingError;
use super::repository::Ledger;

/// Trimmed, validated enrollment fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EnrollmentSlot {
    pub(crate) specialty: String,
    pub(crate) state: String,
    pub(crate) municipality: String,
    pub(crate) description: String,
}

pub(crate) fn validate(request: &EnrollmentRequest) -> Result<EnrollmentSlot, MatchingError> {
    let fields = [
        ("state", request.state.trim()),
        ("municipality", request.municipality.trim()),
        ("specialty", request.specialty.trim()),
        ("description", request.description.trim()),
    ];
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(MatchingError::validation(format!(
            "all fields are required; missing: {}",
            missing.join(", ")
        )));
    }

    Ok(EnrollmentSlot {
        specialty: request.specialty.trim().to_string(),
        state: request.state.trim().to_string(),
        municipality: request.municipality.trim().to_string(),
        description: request.description.trim().to_string(),
    })
}

/// Create an `awaiting_draw` entry unless the patient already holds an open one for the slot.
pub(crate) fn enroll(
    ledger: &mut Ledger,
    patient: UserId,
    slot: &EnrollmentSlot,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<Enrollment, MatchingError> {
    let duplicate = ledger.enrollments().any(|existing| {
        existing.occupies_slot(patient, &slot.specialty, &slot.state, &slot.municipality)
            && existing.blocks_new_enrollment(now)
    });
    if duplicate {
        return Err(MatchingError::DuplicateActiveEnrollment {
            specialty: slot.specialty.clone(),
            state: slot.state.clone(),
            municipality: slot.municipality.clone(),
        });
    }

    let enrollment = Enrollment {
        id: ledger.allocate_enrollment_id(),
        patient_id: patient,
        professional_id: None,
        specialty: slot.specialty.clone(),
        state: slot.state.clone(),
        municipality: slot.municipality.clone(),
        description: slot.description.clone(),
        status: EnrollmentStatus::AwaitingDraw,
        enrolled_at: now,
        renewed_at: None,
        drawn_at: None,
        expires_at: Some(now + ttl),
        cancelled_by_patient_at: None,
        cancelled_by_professional_at: None,
        finalized_at: None,
        origin_enrollment_id: None,
    };
    ledger.put_enrollment(enrollment.clone());
    info!(
        enrollment_id = %enrollment.id,
        patient_id = %patient,
        specialty = %enrollment.specialty,
        "patient enrolled in draw pool"
    );
    Ok(enrollment)
}

/// Entries owned by someone else are reported as missing.
pub(crate) fn owned<'a>(
    ledger: &'a Ledger,
    patient: UserId,
    id: EnrollmentId,
) -> Result<&'a Enrollment, MatchingError> {
    ledger
        .enrollment(id)
        .filter(|enrollment| enrollment.patient_id == patient)
        .ok_or_else(|| MatchingError::not_found(format!("enrollment {id} not found")))
}

fn owned_mut<'a>(
    ledger: &'a mut Ledger,
    patient: UserId,
    id: EnrollmentId,
) -> Result<&'a mut Enrollment, MatchingError> {
    ledger
        .enrollment_mut(id)
        .filter(|enrollment| enrollment.patient_id == patient)
        .ok_or_else(|| MatchingError::not_found(format!("enrollment {id} not found")))
}

/// Extend an awaiting entry by a fresh TTL. Status is unchanged.
///
/// A lapsed entry is only revived while no other open entry holds the same slot.
pub(crate) fn renew(
    ledger: &mut Ledger,
    patient: UserId,
    id: EnrollmentId,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<Enrollment, MatchingError> {
    let current = owned(ledger, patient, id)?;
    if current.status != EnrollmentStatus::AwaitingDraw {
        return Err(MatchingError::InvalidStateTransition {
            action: StateAction::Renew,
            status: current.status.code(),
        });
    }
    if !current.is_unexpired(now) {
        let superseded = ledger.enrollments().any(|other| {
            other.id != id
                && other.occupies_slot(
                    patient,
                    &current.specialty,
                    &current.state,
                    &current.municipality,
                )
                && other.blocks_new_enrollment(now)
        });
        if superseded {
            return Err(MatchingError::DuplicateActiveEnrollment {
                specialty: current.specialty.clone(),
                state: current.state.clone(),
                municipality: current.municipality.clone(),
            });
        }
    }

    let enrollment = owned_mut(ledger, patient, id)?;
    enrollment.renewed_at = Some(now);
    enrollment.expires_at = Some(now + ttl);
    info!(enrollment_id = %id, "enrollment renewed");
    Ok(enrollment.clone())
}

/// Patient withdraws an entry that has not been drawn yet. No requeue follows.
pub(crate) fn withdraw(
    ledger: &mut Ledger,
    patient: UserId,
    id: EnrollmentId,
    now: DateTime<Utc>,
) -> Result<Enrollment, MatchingError> {
    let enrollment = owned_mut(ledger, patient, id)?;
    if enrollment.status != EnrollmentStatus::AwaitingDraw {
        return Err(MatchingError::InvalidStateTransition {
            action: StateAction::Withdraw,
            status: enrollment.status.code(),
        });
    }
    enrollment.status = EnrollmentStatus::CancelledByPatient;
    enrollment.cancelled_by_patient_at = Some(now);
    info!(enrollment_id = %id, "enrollment cancelled by patient");
    Ok(enrollment.clone())
}

/// Unexpired awaiting entries, one per specialty, lowest id first.
pub(crate) fn awaiting(ledger: &Ledger, patient: UserId, now: DateTime<Utc>) -> Vec<Enrollment> {
    let mut seen = BTreeSet::new();
    ledger
        .enrollments()
        .filter(|enrollment| enrollment.patient_id == patient && enrollment.is_drawable(now))
        .filter(|enrollment| seen.insert(enrollment.specialty.clone()))
        .cloned()
        .collect()
}

/// Close the entry behind an engagement. Only moves it when it is still in `expected`.
pub(crate) fn settle(
    ledger: &mut Ledger,
    id: EnrollmentId,
    expected: EnrollmentStatus,
    outcome: EnrollmentStatus,
    now: DateTime<Utc>,
) -> bool {
    let Some(enrollment) = ledger.enrollment_mut(id) else {
        debug!(enrollment_id = %id, "no enrollment behind engagement");
        return false;
    };
    if enrollment.status != expected {
        debug!(
            enrollment_id = %id,
            status = enrollment.status.code(),
            expected = expected.code(),
            "enrollment not in expected status; left unchanged"
        );
        return false;
    }

    enrollment.status = outcome;
    match outcome {
        EnrollmentStatus::CancelledByPatient => enrollment.cancelled_by_patient_at = Some(now),
        EnrollmentStatus::CancelledByProfessional => {
            enrollment.cancelled_by_professional_at = Some(now)
        }
        EnrollmentStatus::CompletedByProfessional => enrollment.finalized_at = Some(now),
        EnrollmentStatus::Confirmed => {
            enrollment.finalized_at.get_or_insert(now);
        }
        EnrollmentStatus::AwaitingDraw | EnrollmentStatus::DrawnInProgress => {}
    }
    info!(enrollment_id = %id, status = outcome.code(), "enrollment settled");
    true
}

/// Return the patient of a professional-cancelled entry to the pool with a fresh entry.
pub(crate) fn requeue(
    ledger: &mut Ledger,
    origin: EnrollmentId,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Option<Enrollment> {
    let source = ledger
        .enrollment(origin)
        .filter(|source| source.status == EnrollmentStatus::CancelledByProfessional)?
        .clone();

    let requeued = Enrollment {
        id: ledger.allocate_enrollment_id(),
        patient_id: source.patient_id,
        professional_id: None,
        specialty: source.specialty,
        state: source.state,
        municipality: source.municipality,
        description: source.description,
        status: EnrollmentStatus::AwaitingDraw,
        enrolled_at: now,
        renewed_at: None,
        drawn_at: None,
        expires_at: Some(now + ttl),
        cancelled_by_patient_at: None,
        cancelled_by_professional_at: None,
        finalized_at: None,
        origin_enrollment_id: Some(origin),
    };
    ledger.put_enrollment(requeued.clone());
    info!(
        enrollment_id = %requeued.id,
        origin_enrollment_id = %origin,
        patient_id = %requeued.patient_id,
        "patient requeued after professional cancellation"
    );
    Some(requeued)
}
