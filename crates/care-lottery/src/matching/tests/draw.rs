use super::common::*;
use chrono::Duration;
use std::collections::BTreeMap;

use crate::matching::domain::{EngagementStatus, EnrollmentId, EnrollmentStatus, UserId};
use crate::matching::draw::{self, UniformPicker};
use crate::matching::error::MatchingError;
use crate::matching::pool;
use crate::matching::repository::Ledger;

fn ledger_with_patients(patients: &[u64]) -> Ledger {
    let mut ledger = Ledger::default();
    let slot = pool::validate(&cardiology_request()).unwrap();
    for patient in patients {
        pool::enroll(&mut ledger, UserId(*patient), &slot, start(), Duration::days(30)).unwrap();
    }
    ledger
}

#[test]
fn candidates_are_awaiting_unexpired_entries_in_the_professionals_slot() {
    let mut ledger = ledger_with_patients(&[3, 4, 10]);

    let mut request = cardiology_request();
    request.municipality = "Campinas".to_string();
    let other_city = pool::validate(&request).unwrap();
    pool::enroll(&mut ledger, UserId(11), &other_city, start(), Duration::days(30)).unwrap();

    ledger.enrollment_mut(EnrollmentId(2)).unwrap().expires_at = Some(start());
    ledger.enrollment_mut(EnrollmentId(3)).unwrap().status = EnrollmentStatus::CancelledByPatient;

    let found = draw::candidates(&ledger, &dr_joao(), start(), false);
    assert_eq!(found, vec![EnrollmentId(1)]);
}

#[test]
fn entries_without_expiry_stay_eligible() {
    let mut ledger = ledger_with_patients(&[3]);
    ledger.enrollment_mut(EnrollmentId(1)).unwrap().expires_at = None;

    let later = start() + Duration::days(365);
    assert_eq!(
        draw::candidates(&ledger, &dr_joao(), later, false),
        vec![EnrollmentId(1)]
    );
}

#[test]
fn empty_pool_reports_no_eligible_candidates() {
    let mut ledger = Ledger::default();
    let result = draw::draw(
        &mut ledger,
        &dr_joao(),
        &FixedPicker(0),
        start(),
        Duration::days(30),
        false,
    );
    assert!(matches!(
        result,
        Err(MatchingError::NoEligibleCandidates { .. })
    ));
    assert_eq!(ledger.engagements().count(), 0);
}

#[test]
fn draw_consumes_exactly_one_entry_and_opens_one_engagement() {
    let mut ledger = ledger_with_patients(&[3, 4, 10]);
    let before = ledger.clone();

    let pair = draw::draw(
        &mut ledger,
        &dr_joao(),
        &FixedPicker(1),
        start(),
        Duration::days(30),
        false,
    )
    .expect("draw succeeds");

    assert_eq!(pair.enrollment.id, EnrollmentId(2));
    assert_eq!(pair.enrollment.status, EnrollmentStatus::DrawnInProgress);
    assert_eq!(pair.enrollment.professional_id, Some(DR_JOAO.id));
    assert_eq!(pair.enrollment.drawn_at, Some(start()));

    assert_eq!(pair.engagement.status, EngagementStatus::Active);
    assert_eq!(pair.engagement.enrollment_id, Some(pair.enrollment.id));
    assert_eq!(pair.engagement.patient_id, UserId(4));
    assert_eq!(pair.engagement.started_at, start());
    assert_eq!(pair.engagement.ended_at, Some(start() + Duration::days(30)));

    assert_eq!(ledger.engagements().count(), 1);
    for untouched in [EnrollmentId(1), EnrollmentId(3)] {
        assert_eq!(ledger.enrollment(untouched), before.enrollment(untouched));
    }
}

#[test]
fn out_of_range_pick_is_clamped_to_last_candidate() {
    let mut ledger = ledger_with_patients(&[3, 4]);
    let pair = draw::draw(
        &mut ledger,
        &dr_joao(),
        &FixedPicker(usize::MAX),
        start(),
        Duration::days(30),
        false,
    )
    .unwrap();
    assert_eq!(pair.enrollment.id, EnrollmentId(2));
}

#[test]
fn repeat_patient_exclusion_is_opt_in() {
    let mut ledger = ledger_with_patients(&[3]);
    {
        let previous = ledger.enrollment_mut(EnrollmentId(1)).unwrap();
        previous.status = EnrollmentStatus::CancelledByProfessional;
        previous.professional_id = Some(DR_JOAO.id);
    }
    let slot = pool::validate(&cardiology_request()).unwrap();
    pool::enroll(&mut ledger, UserId(3), &slot, start(), Duration::days(30)).unwrap();

    assert_eq!(
        draw::candidates(&ledger, &dr_joao(), start(), false),
        vec![EnrollmentId(2)]
    );
    assert!(draw::candidates(&ledger, &dr_joao(), start(), true).is_empty());
}

#[test]
fn uniform_picker_spreads_wins_evenly() {
    let pool_state = ledger_with_patients(&[3, 4, 10, 11]);
    let picker = UniformPicker::seeded(7);
    let rounds = 4_000;

    let mut wins: BTreeMap<EnrollmentId, usize> = BTreeMap::new();
    for _ in 0..rounds {
        let mut ledger = pool_state.clone();
        let pair = draw::draw(
            &mut ledger,
            &dr_joao(),
            &picker,
            start(),
            Duration::days(30),
            false,
        )
        .unwrap();
        *wins.entry(pair.enrollment.id).or_default() += 1;
    }

    assert_eq!(wins.len(), 4);
    let expected = rounds / 4;
    for (id, count) in wins {
        assert!(
            count.abs_diff(expected) < 150,
            "enrollment {id} won {count} of {rounds} draws"
        );
    }
}
