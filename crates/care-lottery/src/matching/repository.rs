use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::domain::{Engagement, EngagementId, Enrollment, EnrollmentId};

/// Enrollment and engagement tables as seen inside one transaction.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    engagements: BTreeMap<EngagementId, Engagement>,
    last_enrollment_id: u64,
    last_engagement_id: u64,
}

impl Ledger {
    pub fn allocate_enrollment_id(&mut self) -> EnrollmentId {
        self.last_enrollment_id += 1;
        EnrollmentId(self.last_enrollment_id)
    }

    pub fn allocate_engagement_id(&mut self) -> EngagementId {
        self.last_engagement_id += 1;
        EngagementId(self.last_engagement_id)
    }

    /// Insert or replace an enrollment row.
    pub fn put_enrollment(&mut self, enrollment: Enrollment) {
        self.last_enrollment_id = self.last_enrollment_id.max(enrollment.id.0);
        self.enrollments.insert(enrollment.id, enrollment);
    }

    /// Insert or replace an engagement row.
    pub fn put_engagement(&mut self, engagement: Engagement) {
        self.last_engagement_id = self.last_engagement_id.max(engagement.id.0);
        self.engagements.insert(engagement.id, engagement);
    }

    pub fn enrollment(&self, id: EnrollmentId) -> Option<&Enrollment> {
        self.enrollments.get(&id)
    }

    pub fn enrollment_mut(&mut self, id: EnrollmentId) -> Option<&mut Enrollment> {
        self.enrollments.get_mut(&id)
    }

    /// Enrollments in ascending id order.
    pub fn enrollments(&self) -> impl Iterator<Item = &Enrollment> {
        self.enrollments.values()
    }

    pub fn engagement(&self, id: EngagementId) -> Option<&Engagement> {
        self.engagements.get(&id)
    }

    /// Engagements in ascending id order.
    pub fn engagements(&self) -> impl Iterator<Item = &Engagement> {
        self.engagements.values()
    }

    pub fn engagements_mut(&mut self) -> impl Iterator<Item = &mut Engagement> {
        self.engagements.values_mut()
    }

    /// Pool entry an engagement was drawn from.
    ///
    /// Uses the explicit link when present; rows written without it fall back to the most
    /// recent enrollment of the same patient, professional, and specialty.
    pub fn correlated_enrollment_id(&self, engagement: &Engagement) -> Option<EnrollmentId> {
        engagement.enrollment_id.or_else(|| {
            self.enrollments
                .values()
                .rev()
                .find(|enrollment| {
                    enrollment.patient_id == engagement.patient_id
                        && enrollment.professional_id == Some(engagement.professional_id)
                        && enrollment.specialty == engagement.specialty
                })
                .map(|enrollment| enrollment.id)
        })
    }

    pub fn correlated_enrollment(&self, engagement: &Engagement) -> Option<&Enrollment> {
        self.correlated_enrollment_id(engagement)
            .and_then(|id| self.enrollment(id))
    }
}

/// Persistence seam for the matching engine.
///
/// `transact` runs one serializable unit of work: no other transaction interleaves with it,
/// and an `Err` from `op` discards every write it made.
pub trait MatchStore: Send + Sync {
    fn transact<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut Ledger) -> Result<T, E>,
        E: From<RepositoryError>;

    fn read<T, F>(&self, op: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Ledger) -> T;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Mutex-guarded ledger. Transactions run against a copy that replaces the
/// committed state only when the unit of work succeeds.
///
/// Every write clones the whole ledger; acceptable for a single-process store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMatchStore {
    ledger: Arc<Mutex<Ledger>>,
}

impl MatchStore for InMemoryMatchStore {
    fn transact<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut Ledger) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut committed = self
            .ledger
            .lock()
            .map_err(|_| RepositoryError::Unavailable("ledger lock poisoned".to_string()))?;
        let mut working = committed.clone();
        let value = op(&mut working)?;
        *committed = working;
        Ok(value)
    }

    fn read<T, F>(&self, op: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Ledger) -> T,
    {
        let committed = self
            .ledger
            .lock()
            .map_err(|_| RepositoryError::Unavailable("ledger lock poisoned".to_string()))?;
        Ok(op(&committed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::domain::{EngagementStatus, EnrollmentStatus, UserId};
    use chrono::{TimeZone, Utc};

    fn enrollment(id: u64, professional: Option<u64>) -> Enrollment {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Enrollment {
            id: EnrollmentId(id),
            patient_id: UserId(10),
            professional_id: professional.map(UserId),
            specialty: "Cardiology".to_string(),
            state: "SP".to_string(),
            municipality: "São Paulo".to_string(),
            description: "chest pain".to_string(),
            status: EnrollmentStatus::DrawnInProgress,
            enrolled_at: at,
            renewed_at: None,
            drawn_at: Some(at),
            expires_at: None,
            cancelled_by_patient_at: None,
            cancelled_by_professional_at: None,
            finalized_at: None,
            origin_enrollment_id: None,
        }
    }

    fn engagement(enrollment_id: Option<u64>) -> Engagement {
        Engagement {
            id: EngagementId(1),
            enrollment_id: enrollment_id.map(EnrollmentId),
            professional_id: UserId(1),
            patient_id: UserId(10),
            specialty: "Cardiology".to_string(),
            status: EngagementStatus::Active,
            started_at: Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap(),
            ended_at: None,
            cancellation_justification: None,
            confirmed_at: None,
        }
    }

    #[test]
    fn failed_transaction_leaves_no_partial_writes() {
        let store = InMemoryMatchStore::default();
        let result: Result<(), RepositoryError> = store.transact(|ledger| {
            let id = ledger.allocate_enrollment_id();
            ledger.put_enrollment(enrollment(id.0, None));
            Err(RepositoryError::Unavailable("disk full".to_string()))
        });
        assert!(result.is_err());

        let count = store.read(|ledger| ledger.enrollments().count()).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn correlation_prefers_explicit_link_and_falls_back_to_latest_match() {
        let mut ledger = Ledger::default();
        ledger.put_enrollment(enrollment(1, Some(1)));
        ledger.put_enrollment(enrollment(2, Some(1)));
        ledger.put_enrollment(enrollment(3, Some(7)));

        assert_eq!(
            ledger.correlated_enrollment_id(&engagement(Some(1))),
            Some(EnrollmentId(1))
        );
        assert_eq!(
            ledger.correlated_enrollment_id(&engagement(None)),
            Some(EnrollmentId(2))
        );
    }

    #[test]
    fn allocated_ids_skip_past_imported_rows() {
        let mut ledger = Ledger::default();
        ledger.put_enrollment(enrollment(41, None));
        assert_eq!(ledger.allocate_enrollment_id(), EnrollmentId(42));
    }
}
