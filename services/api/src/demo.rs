use care_lottery::config::MatchingPolicy;
use care_lottery::error::AppError;
use care_lottery::matching::{
    Actor, DrawView, EngagementId, EnrollmentRequest, InMemoryDirectory, InMemoryMatchStore,
    ManualClock, MatchingError, MatchingService, Notification, NotificationTemplates, Notifier,
    NotifyError, UniformPicker,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Seed for the draw picker, so runs can be replayed
    #[arg(long, default_value_t = 7)]
    pub(crate) seed: u64,
    /// Date the demo clock starts at (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) start: Option<NaiveDate>,
}

/// Prints every message instead of sending it.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        println!(
            "    mail to {}: {}",
            notification.destination, notification.subject
        );
        Ok(())
    }
}

type DemoService = MatchingService<InMemoryMatchStore, InMemoryDirectory, ConsoleNotifier>;

const PATIENT_ANA: Actor = Actor::patient(3);
const PATIENT_CARLOS: Actor = Actor::patient(4);
const DR_JOAO: Actor = Actor::professional(1);
const ADMIN: Actor = Actor::admin(900);

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let start = demo_start(args.start);
    let clock = Arc::new(ManualClock::new(start));
    let policy = MatchingPolicy::default();
    let service: DemoService = MatchingService::new(
        Arc::new(InMemoryMatchStore::default()),
        Arc::new(InMemoryDirectory::sample()),
        Arc::new(ConsoleNotifier),
        policy.clone(),
        NotificationTemplates::new("http://localhost:3000", policy.confirmation_grace_days),
    )
    .with_picker(Arc::new(UniformPicker::seeded(args.seed)))
    .with_clock(clock.clone());

    println!("Care lottery demo (seed {}, starting {})", args.seed, start.date_naive());

    println!("\n1. Enrollment");
    let mut campinas = cardiology_request("Ana needs a follow-up after an arrhythmia episode");
    campinas.municipality = "Campinas".to_string();
    expect_rejection(
        "Ana enrolls for Cardiology in Campinas/SP",
        service.enroll(&PATIENT_ANA, &campinas),
    );
    for (actor, description) in [
        (PATIENT_ANA, "Ana needs a follow-up after an arrhythmia episode"),
        (PATIENT_CARLOS, "Carlos has chest pain when climbing stairs"),
    ] {
        let enrollment = service.enroll(&actor, &cardiology_request(description))?;
        println!(
            "  patient {} enrolled as #{} ({}), expires {}",
            actor.id,
            enrollment.id,
            service.labels().enrollment(enrollment.status),
            stamp(enrollment.expires_at)
        );
    }
    expect_rejection(
        "Ana enrolls again for the same slot",
        service.enroll(
            &PATIENT_ANA,
            &cardiology_request("Ana needs a follow-up after an arrhythmia episode"),
        ),
    );

    println!("\n2. Draw and professional cancellation");
    let first = draw(&service)?;
    clock.advance(Duration::days(2));
    let cancelled = service.cancel_engagement(
        &DR_JOAO,
        first,
        "schedule conflict with another surgery this month",
    )?;
    println!(
        "  engagement #{} is now {}",
        cancelled.engagement.id,
        service.labels().engagement(cancelled.engagement.status)
    );
    if let Some(requeued) = &cancelled.requeued {
        println!(
            "  patient {} requeued as #{} (origin #{})",
            requeued.patient_id,
            requeued.id,
            requeued
                .origin_enrollment_id
                .map(|origin| origin.to_string())
                .unwrap_or_default()
        );
    }

    println!("\n3. Completion and confirmation");
    let second = draw(&service)?;
    let patient = engagement_patient(&service, second)?;
    clock.advance(Duration::days(5));
    let completed = service.complete_engagement(&DR_JOAO, second)?;
    println!(
        "  engagement #{} is now {}",
        completed.id,
        service.labels().engagement(completed.status)
    );
    clock.advance(Duration::days(1));
    let confirmed = service.confirm_engagement(&patient, second)?;
    println!(
        "  engagement #{} is now {}",
        confirmed.id,
        service.labels().engagement(confirmed.status)
    );
    expect_rejection(
        "patient confirms a second time",
        service.confirm_engagement(&patient, second),
    );

    println!("\n4. Unconfirmed completion sweep");
    let third = draw(&service)?;
    service.complete_engagement(&DR_JOAO, third)?;
    clock.advance(Duration::days(policy.confirmation_grace_days));
    let report = service.sweep_unconfirmed(&ADMIN)?;
    println!(
        "  sweep after {} days closed {:?}",
        policy.confirmation_grace_days,
        report.closed.iter().map(|id| id.0).collect::<Vec<_>>()
    );
    expect_rejection(
        "professional draws from an empty pool",
        service.draw(&DR_JOAO),
    );

    println!("\nEngagements");
    for summary in service.engagements(&ADMIN)? {
        println!(
            "  #{} patient {} | {} | started {} | ended {}",
            summary.engagement.id,
            summary.engagement.patient_id,
            service.labels().engagement(summary.engagement.status),
            stamp(Some(summary.engagement.started_at)),
            stamp(summary.engagement.ended_at)
        );
    }

    Ok(())
}

fn demo_start(start: Option<NaiveDate>) -> DateTime<Utc> {
    start
        .and_then(|date| date.and_hms_opt(9, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or_else(Utc::now)
}

fn cardiology_request(description: &str) -> EnrollmentRequest {
    EnrollmentRequest {
        state: "SP".to_string(),
        municipality: "São Paulo".to_string(),
        specialty: "Cardiology".to_string(),
        description: description.to_string(),
    }
}

fn draw(service: &DemoService) -> Result<EngagementId, AppError> {
    let outcome = service.draw(&DR_JOAO)?;
    let view = DrawView::new(&outcome, service.labels());
    println!(
        "  Dr. João drew patient {} (enrollment #{}), engagement #{}",
        view.patient.name.as_deref().unwrap_or("unknown"),
        view.patient.enrollment_id,
        view.engagement.id
    );
    Ok(outcome.engagement.id)
}

fn engagement_patient(service: &DemoService, id: EngagementId) -> Result<Actor, AppError> {
    let detail = service.engagement(&DR_JOAO, id)?;
    Ok(Actor::patient(detail.engagement.patient_id.0))
}

fn expect_rejection<T>(step: &str, result: Result<T, MatchingError>) {
    match result {
        Ok(_) => println!("  {step}: accepted"),
        Err(error) => println!(
            "  {step}: rejected ({}, {})",
            error.status_code().as_u16(),
            error
        ),
    }
}

fn stamp(at: Option<DateTime<Utc>>) -> String {
    at.map(care_lottery::matching::views::timestamp)
        .unwrap_or_else(|| "-".to_string())
}
