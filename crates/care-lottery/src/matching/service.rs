use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::directory::{IdentityDirectory, PatientProfile, ProfessionalProfile};
use super::domain::{
    Actor, Engagement, EngagementId, Enrollment, EnrollmentId, EnrollmentRequest, Role,
};
use super::draw::{self, CandidatePicker, UniformPicker};
use super::error::MatchingError;
use super::labels::StatusLabels;
use super::lifecycle::{self, LifecycleCommand, LifecycleEvent};
use super::notify::{dispatch, NotificationTemplates, Notifier};
use super::pool;
use super::repository::{Ledger, MatchStore};
use crate::config::MatchingPolicy;

/// Service composing the store, identity directory, notifier, and draw picker.
pub struct MatchingService<S, D, N> {
    store: Arc<S>,
    directory: Arc<D>,
    notifier: Arc<N>,
    picker: Arc<dyn CandidatePicker>,
    clock: Arc<dyn Clock>,
    policy: MatchingPolicy,
    templates: NotificationTemplates,
    labels: Arc<StatusLabels>,
}

/// A successful draw as reported to the drawing professional.
#[derive(Debug, Clone)]
pub struct DrawOutcome {
    pub enrollment: Enrollment,
    pub engagement: Engagement,
    pub patient: Option<PatientProfile>,
}

#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    pub engagement: Engagement,
    /// New pool entry created when the professional cancelled.
    pub requeued: Option<Enrollment>,
}

#[derive(Debug, Clone)]
pub struct EngagementSummary {
    pub engagement: Engagement,
    pub enrollment: Option<Enrollment>,
    /// Name of the other participant, from the caller's point of view.
    pub counterpart: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EngagementDetail {
    pub engagement: Engagement,
    pub enrollment: Option<Enrollment>,
    pub patient: Option<PatientProfile>,
    pub professional: Option<ProfessionalProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub closed: Vec<EngagementId>,
}

struct AppliedTransition {
    engagement: Engagement,
    requeued: Option<Enrollment>,
    confirmation_requested: bool,
}

impl<S, D, N> MatchingService<S, D, N>
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<D>,
        notifier: Arc<N>,
        policy: MatchingPolicy,
        templates: NotificationTemplates,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            picker: Arc::new(UniformPicker::from_entropy()),
            clock: Arc::new(SystemClock),
            policy,
            templates,
            labels: Arc::new(StatusLabels::standard()),
        }
    }

    pub fn with_picker(mut self, picker: Arc<dyn CandidatePicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn labels(&self) -> &StatusLabels {
        &self.labels
    }

    pub fn policy(&self) -> &MatchingPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Put the patient into the draw pool for a specialty and location.
    pub fn enroll(
        &self,
        actor: &Actor,
        request: &EnrollmentRequest,
    ) -> Result<Enrollment, MatchingError> {
        require_role(actor, Role::Patient, "only patients can enroll")?;
        let slot = pool::validate(request)?;

        let has_provider = observe(
            "enroll",
            self.directory
                .has_professional(&slot.specialty, &slot.state, &slot.municipality)
                .map_err(MatchingError::from),
        )?;
        if !has_provider {
            return Err(MatchingError::NoProviderAvailable {
                specialty: slot.specialty,
                state: slot.state,
                municipality: slot.municipality,
            });
        }

        let now = self.clock.now();
        let ttl = self.policy.enrollment_ttl();
        observe(
            "enroll",
            self.store
                .transact(|ledger| pool::enroll(ledger, actor.id, &slot, now, ttl)),
        )
    }

    pub fn renew_enrollment(
        &self,
        actor: &Actor,
        id: EnrollmentId,
    ) -> Result<Enrollment, MatchingError> {
        require_role(actor, Role::Patient, "only patients can renew enrollments")?;
        let now = self.clock.now();
        let ttl = self.policy.enrollment_ttl();
        observe(
            "renew",
            self.store
                .transact(|ledger| pool::renew(ledger, actor.id, id, now, ttl)),
        )
    }

    pub fn withdraw_enrollment(
        &self,
        actor: &Actor,
        id: EnrollmentId,
    ) -> Result<Enrollment, MatchingError> {
        require_role(actor, Role::Patient, "only patients can cancel enrollments")?;
        let now = self.clock.now();
        observe(
            "withdraw",
            self.store
                .transact(|ledger| pool::withdraw(ledger, actor.id, id, now)),
        )
    }

    pub fn enrollment(&self, actor: &Actor, id: EnrollmentId) -> Result<Enrollment, MatchingError> {
        require_role(actor, Role::Patient, "only patients can view enrollments")?;
        self.store
            .read(|ledger| pool::owned(ledger, actor.id, id).cloned())?
    }

    /// Unexpired entries still waiting for a draw, one per specialty.
    pub fn awaiting_enrollments(&self, actor: &Actor) -> Result<Vec<Enrollment>, MatchingError> {
        require_role(actor, Role::Patient, "only patients can list enrollments")?;
        let now = self.clock.now();
        Ok(self
            .store
            .read(|ledger| pool::awaiting(ledger, actor.id, now))?)
    }

    /// Draw one eligible patient for the calling professional.
    pub fn draw(&self, actor: &Actor) -> Result<DrawOutcome, MatchingError> {
        require_role(actor, Role::Professional, "only professionals can draw")?;
        let professional = observe(
            "draw",
            self.directory
                .professional(actor.id)
                .map_err(MatchingError::from),
        )?
        .ok_or_else(|| MatchingError::not_found("professional not found"))?;

        let now = self.clock.now();
        let ceiling = self.policy.engagement_ceiling();
        let exclude = self.policy.exclude_repeat_patients;
        let picker = self.picker.as_ref();
        let pair = observe(
            "draw",
            self.store.transact(|ledger| {
                draw::draw(ledger, &professional, picker, now, ceiling, exclude)
            }),
        )?;

        let patient = self.lookup_patient_after_commit(&pair.enrollment);
        if let Some(patient) = &patient {
            dispatch(
                self.notifier.as_ref(),
                self.templates.drawn(patient, &pair.enrollment),
            );
        }

        Ok(DrawOutcome {
            enrollment: pair.enrollment,
            engagement: pair.engagement,
            patient,
        })
    }

    /// Engagements visible to the caller, most recent first. Admins see all of them.
    pub fn engagements(&self, actor: &Actor) -> Result<Vec<EngagementSummary>, MatchingError> {
        let rows = self.store.read(|ledger| {
            let mut rows: Vec<(Engagement, Option<Enrollment>)> = ledger
                .engagements()
                .filter(|engagement| actor.role == Role::Admin || engagement.involves(actor))
                .map(|engagement| {
                    (
                        engagement.clone(),
                        ledger.correlated_enrollment(engagement).cloned(),
                    )
                })
                .collect();
            rows.sort_by(|(left, _), (right, _)| {
                right
                    .started_at
                    .cmp(&left.started_at)
                    .then(right.id.cmp(&left.id))
            });
            rows
        })?;

        rows.into_iter()
            .map(|(engagement, enrollment)| -> Result<EngagementSummary, MatchingError> {
                let counterpart = match actor.role {
                    Role::Patient => self
                        .directory
                        .professional(engagement.professional_id)?
                        .map(|professional| professional.name),
                    Role::Professional => self
                        .directory
                        .patient(engagement.patient_id)?
                        .map(|patient| patient.name),
                    Role::Admin => None,
                };
                Ok(EngagementSummary {
                    engagement,
                    enrollment,
                    counterpart,
                })
            })
            .collect()
    }

    /// Participants and admins only; anyone else sees "not found".
    pub fn engagement(
        &self,
        actor: &Actor,
        id: EngagementId,
    ) -> Result<EngagementDetail, MatchingError> {
        let row = self.store.read(|ledger| {
            ledger
                .engagement(id)
                .filter(|engagement| actor.role == Role::Admin || engagement.involves(actor))
                .map(|engagement| {
                    (
                        engagement.clone(),
                        ledger.correlated_enrollment(engagement).cloned(),
                    )
                })
        })?;
        let (engagement, enrollment) = row.ok_or_else(|| {
            MatchingError::not_found(format!("engagement {id} not found or access denied"))
        })?;

        let patient = self.directory.patient(engagement.patient_id)?;
        let professional = self.directory.professional(engagement.professional_id)?;
        Ok(EngagementDetail {
            engagement,
            enrollment,
            patient,
            professional,
        })
    }

    pub fn cancel_engagement(
        &self,
        actor: &Actor,
        id: EngagementId,
        justification: &str,
    ) -> Result<CancellationOutcome, MatchingError> {
        if actor.role == Role::Admin {
            return Err(MatchingError::forbidden(
                "only the engagement's patient or professional can cancel it",
            ));
        }
        let applied = self.transition(
            actor,
            id,
            LifecycleCommand::Cancel {
                justification: justification.to_string(),
            },
        )?;
        Ok(CancellationOutcome {
            engagement: applied.engagement,
            requeued: applied.requeued,
        })
    }

    pub fn complete_engagement(
        &self,
        actor: &Actor,
        id: EngagementId,
    ) -> Result<Engagement, MatchingError> {
        require_role(
            actor,
            Role::Professional,
            "only professionals can complete engagements",
        )?;
        let applied = self.transition(actor, id, LifecycleCommand::Complete)?;
        if applied.confirmation_requested {
            self.request_confirmation(&applied.engagement);
        }
        Ok(applied.engagement)
    }

    pub fn confirm_engagement(
        &self,
        actor: &Actor,
        id: EngagementId,
    ) -> Result<Engagement, MatchingError> {
        require_role(actor, Role::Patient, "only patients can confirm completion")?;
        let applied = self.transition(actor, id, LifecycleCommand::Confirm)?;
        Ok(applied.engagement)
    }

    /// Close completions left unconfirmed past the grace period. Admin only.
    pub fn sweep_unconfirmed(&self, actor: &Actor) -> Result<SweepReport, MatchingError> {
        require_role(actor, Role::Admin, "only administrators can run maintenance")?;
        let now = self.clock.now();
        let grace = self.policy.confirmation_grace();
        let closed = observe(
            "sweep",
            self.store.transact(|ledger: &mut Ledger| {
                let mut closed = Vec::new();
                for engagement in ledger.engagements_mut() {
                    if let Some(swept) = lifecycle::sweep(engagement, now, grace) {
                        *engagement = swept;
                        closed.push(engagement.id);
                    }
                }
                Ok::<_, MatchingError>(closed)
            }),
        )?;
        info!(closed = closed.len(), "unconfirmed completions swept");
        Ok(SweepReport { closed })
    }

    fn transition(
        &self,
        actor: &Actor,
        id: EngagementId,
        command: LifecycleCommand,
    ) -> Result<AppliedTransition, MatchingError> {
        let now = self.clock.now();
        let ttl = self.policy.enrollment_ttl();
        let min_chars = self.policy.min_justification_chars;
        let operation = command.action();

        let result = self.store.transact(|ledger: &mut Ledger| -> Result<_, MatchingError> {
            let engagement = ledger
                .engagement(id)
                .cloned()
                .ok_or_else(|| MatchingError::not_found(format!("engagement {id} not found")))?;
            let enrollment_id = ledger.correlated_enrollment_id(&engagement);
            let transition =
                lifecycle::apply(&engagement, enrollment_id, actor, command, now, min_chars)?;
            ledger.put_engagement(transition.engagement.clone());

            let mut settled = Vec::new();
            let mut requeued = None;
            let mut confirmation_requested = false;
            for event in transition.events {
                match event {
                    LifecycleEvent::EnrollmentSettled {
                        enrollment_id,
                        expected,
                        outcome,
                    } => {
                        if pool::settle(ledger, enrollment_id, expected, outcome, now) {
                            settled.push(enrollment_id);
                        }
                    }
                    LifecycleEvent::PatientRequeued { origin } if settled.contains(&origin) => {
                        requeued = pool::requeue(ledger, origin, now, ttl);
                    }
                    LifecycleEvent::PatientRequeued { origin } => {
                        debug!(
                            enrollment_id = %origin,
                            "origin entry was not settled here; requeue skipped"
                        );
                    }
                    LifecycleEvent::ConfirmationRequested { .. } => {
                        confirmation_requested = true;
                    }
                }
            }

            Ok(AppliedTransition {
                engagement: transition.engagement,
                requeued,
                confirmation_requested,
            })
        });

        let applied = observe("transition", result)?;
        info!(
            engagement_id = %applied.engagement.id,
            action = %operation,
            status = applied.engagement.status.code(),
            requeued = applied.requeued.is_some(),
            "engagement transitioned"
        );
        Ok(applied)
    }

    fn request_confirmation(&self, engagement: &Engagement) {
        let patient = match self.directory.patient(engagement.patient_id) {
            Ok(Some(patient)) => patient,
            Ok(None) => {
                warn!(engagement_id = %engagement.id, "patient missing; confirmation not sent");
                return;
            }
            Err(error) => {
                warn!(engagement_id = %engagement.id, %error, "confirmation not sent");
                return;
            }
        };
        let professional = self
            .directory
            .professional(engagement.professional_id)
            .ok()
            .flatten();
        dispatch(
            self.notifier.as_ref(),
            self.templates
                .completion_requested(&patient, professional.as_ref(), engagement),
        );
    }

    fn lookup_patient_after_commit(&self, enrollment: &Enrollment) -> Option<PatientProfile> {
        match self.directory.patient(enrollment.patient_id) {
            Ok(patient) => patient,
            Err(error) => {
                warn!(
                    enrollment_id = %enrollment.id,
                    %error,
                    "drawn patient lookup failed; draw kept"
                );
                None
            }
        }
    }
}

fn require_role(actor: &Actor, role: Role, message: &str) -> Result<(), MatchingError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(MatchingError::forbidden(message))
    }
}

/// Log infrastructure failures loudly and domain rejections quietly.
fn observe<T>(
    operation: &'static str,
    result: Result<T, MatchingError>,
) -> Result<T, MatchingError> {
    if let Err(failure) = &result {
        match failure {
            MatchingError::Repository(_) | MatchingError::Directory(_) => {
                error!(operation, error = %failure, "matching operation aborted")
            }
            other => debug!(operation, error = %other, "matching operation rejected"),
        }
    }
    result
}
