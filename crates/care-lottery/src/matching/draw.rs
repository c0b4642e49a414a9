//! Draw engine: uniform random selection of one eligible pool entry per call.

use std::collections::BTreeSet;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use super::directory::ProfessionalProfile;
use super::domain::{
    Engagement, EngagementStatus, Enrollment, EnrollmentId, EnrollmentStatus, UserId,
};
use super::error::MatchingError;
use super::repository::Ledger;

/// Chooses the winning index among `candidates` entries.
pub trait CandidatePicker: Send + Sync {
    fn pick(&self, candidates: usize) -> usize;
}

/// Every candidate has the same probability, regardless of wait time.
#[derive(Debug)]
pub struct UniformPicker {
    rng: Mutex<StdRng>,
}

impl UniformPicker {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for UniformPicker {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl CandidatePicker for UniformPicker {
    fn pick(&self, candidates: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(0..candidates)
    }
}

/// Result of a successful draw: the consumed entry and the engagement it became.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawnPair {
    pub enrollment: Enrollment,
    pub engagement: Engagement,
}

/// Awaiting, unexpired entries in the professional's slot, in id order.
pub(crate) fn candidates(
    ledger: &Ledger,
    professional: &ProfessionalProfile,
    now: DateTime<Utc>,
    exclude_repeat_patients: bool,
) -> Vec<EnrollmentId> {
    let previously_drawn: BTreeSet<UserId> = if exclude_repeat_patients {
        ledger
            .enrollments()
            .filter(|enrollment| enrollment.professional_id == Some(professional.id))
            .map(|enrollment| enrollment.patient_id)
            .collect()
    } else {
        BTreeSet::new()
    };

    ledger
        .enrollments()
        .filter(|enrollment| {
            enrollment.is_drawable(now)
                && enrollment.specialty == professional.specialty
                && enrollment.state == professional.state
                && enrollment.municipality == professional.municipality
                && !previously_drawn.contains(&enrollment.patient_id)
        })
        .map(|enrollment| enrollment.id)
        .collect()
}

/// Consume one candidate and open an engagement for it.
///
/// Runs inside the caller's transaction, so the candidate read and the status write are not
/// interleaved with any other draw or cancellation.
pub(crate) fn draw<P>(
    ledger: &mut Ledger,
    professional: &ProfessionalProfile,
    picker: &P,
    now: DateTime<Utc>,
    engagement_ceiling: Duration,
    exclude_repeat_patients: bool,
) -> Result<DrawnPair, MatchingError>
where
    P: CandidatePicker + ?Sized,
{
    let pool = candidates(ledger, professional, now, exclude_repeat_patients);
    if pool.is_empty() {
        return Err(MatchingError::NoEligibleCandidates {
            specialty: professional.specialty.clone(),
            state: professional.state.clone(),
            municipality: professional.municipality.clone(),
        });
    }

    let winner = pool[picker.pick(pool.len()).min(pool.len() - 1)];
    let enrollment = {
        let entry = ledger
            .enrollment_mut(winner)
            .ok_or_else(|| MatchingError::not_found(format!("enrollment {winner} not found")))?;
        entry.status = EnrollmentStatus::DrawnInProgress;
        entry.professional_id = Some(professional.id);
        entry.drawn_at = Some(now);
        entry.clone()
    };

    let engagement = Engagement {
        id: ledger.allocate_engagement_id(),
        enrollment_id: Some(enrollment.id),
        professional_id: professional.id,
        patient_id: enrollment.patient_id,
        specialty: professional.specialty.clone(),
        status: EngagementStatus::Active,
        started_at: now,
        ended_at: Some(now + engagement_ceiling),
        cancellation_justification: None,
        confirmed_at: None,
    };
    ledger.put_engagement(engagement.clone());

    info!(
        professional_id = %professional.id,
        enrollment_id = %enrollment.id,
        engagement_id = %engagement.id,
        candidates = pool.len(),
        "patient drawn"
    );
    Ok(DrawnPair {
        enrollment,
        engagement,
    })
}
