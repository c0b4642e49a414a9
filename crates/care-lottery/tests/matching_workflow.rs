use std::collections::BTreeSet;
use std::sync::Arc;

use care_lottery::config::MatchingPolicy;
use care_lottery::matching::{
    Actor, DirectorySeed, EngagementStatus, EnrollmentRequest, EnrollmentStatus,
    InMemoryDirectory, InMemoryMatchStore, MatchStore, MatchingError, MatchingService,
    Notification, NotificationTemplates, Notifier, NotifyError, PatientProfile, UniformPicker,
    UserId,
};

struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

fn service_over(
    store: Arc<InMemoryMatchStore>,
    directory: InMemoryDirectory,
) -> MatchingService<InMemoryMatchStore, InMemoryDirectory, SilentNotifier> {
    MatchingService::new(
        store,
        Arc::new(directory),
        Arc::new(SilentNotifier),
        MatchingPolicy::default(),
        NotificationTemplates::new("http://localhost:3000", 30),
    )
    .with_picker(Arc::new(UniformPicker::seeded(42)))
}

fn cardiology() -> EnrollmentRequest {
    EnrollmentRequest {
        state: "SP".to_string(),
        municipality: "São Paulo".to_string(),
        specialty: "Cardiology".to_string(),
        description: "palpitations at night".to_string(),
    }
}

#[test]
fn enroll_draw_complete_confirm_scenario() {
    let store = Arc::new(InMemoryMatchStore::default());
    let patient = Actor::patient(3);
    let doctor = Actor::professional(1);

    let without_doctor = service_over(
        store.clone(),
        InMemoryDirectory::from_seed(DirectorySeed::default()),
    );
    assert!(matches!(
        without_doctor.enroll(&patient, &cardiology()),
        Err(MatchingError::NoProviderAvailable { .. })
    ));

    let service = service_over(store.clone(), InMemoryDirectory::sample());
    let enrollment = service.enroll(&patient, &cardiology()).expect("enrolls");
    assert_eq!(enrollment.status, EnrollmentStatus::AwaitingDraw);

    let drawn = service.draw(&doctor).expect("draws");
    assert_eq!(drawn.enrollment.id, enrollment.id);
    assert_eq!(drawn.enrollment.status, EnrollmentStatus::DrawnInProgress);
    assert_eq!(drawn.engagement.status, EngagementStatus::Active);

    let completed = service
        .complete_engagement(&doctor, drawn.engagement.id)
        .expect("completes without justification");
    assert_eq!(completed.status, EngagementStatus::CompletedByProfessional);

    let confirmed = service
        .confirm_engagement(&patient, drawn.engagement.id)
        .expect("confirms");
    assert_eq!(confirmed.status, EngagementStatus::ConfirmedByPatient);

    match service.confirm_engagement(&patient, drawn.engagement.id) {
        Err(error @ MatchingError::InvalidStateTransition { .. }) => {
            assert!(error.to_string().contains("confirmed_by_patient"));
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn concurrent_draws_never_share_a_candidate() {
    let mut directory = InMemoryDirectory::sample();
    for id in 100..106 {
        directory.insert_patient(PatientProfile {
            id: UserId(id),
            name: format!("Patient {id}"),
            email: format!("patient{id}@example.com"),
            phone: None,
            state: "SP".to_string(),
            municipality: "São Paulo".to_string(),
        });
    }
    let store = Arc::new(InMemoryMatchStore::default());
    let service = Arc::new(service_over(store.clone(), directory));
    for id in 100..106 {
        service.enroll(&Actor::patient(id), &cardiology()).unwrap();
    }

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let service = service.clone();
                scope.spawn(move || service.draw(&Actor::professional(1)))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("draw thread"))
            .collect()
    });

    let winners: Vec<_> = results
        .iter()
        .filter_map(|result| result.as_ref().ok())
        .map(|outcome| outcome.enrollment.id)
        .collect();
    let distinct: BTreeSet<_> = winners.iter().copied().collect();
    assert_eq!(winners.len(), 6);
    assert_eq!(distinct.len(), 6);
    assert_eq!(
        results
            .iter()
            .filter(|result| matches!(result, Err(MatchingError::NoEligibleCandidates { .. })))
            .count(),
        4
    );

    let engagements = store.read(|ledger| ledger.engagements().count()).unwrap();
    assert_eq!(engagements, 6);
}
