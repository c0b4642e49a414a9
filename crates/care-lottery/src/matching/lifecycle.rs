//! Engagement state machine.
//!
//! ```text
//! active ──complete──▶ completed_by_professional ──confirm──▶ confirmed_by_patient
//!   │                         └──(sweep, grace elapsed)──▶ completed_unconfirmed
//!   ├──cancel (patient)──▶ cancelled_by_patient
//!   └──cancel (professional)──▶ cancelled_by_professional  + PatientRequeued
//! ```
//!
//! Transitions are pure: they return the updated engagement plus the events the enrollment
//! pool and the notifier consume. Nothing here touches storage.

use chrono::{DateTime, Duration, Utc};

use super::domain::{
    Actor, Engagement, EngagementId, EngagementStatus, EnrollmentId, EnrollmentStatus, Role,
    StateAction,
};
use super::error::MatchingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCommand {
    Cancel { justification: String },
    Complete,
    Confirm,
}

impl LifecycleCommand {
    pub const fn action(&self) -> StateAction {
        match self {
            LifecycleCommand::Cancel { .. } => StateAction::Cancel,
            LifecycleCommand::Complete => StateAction::Complete,
            LifecycleCommand::Confirm => StateAction::Confirm,
        }
    }
}

/// Side effects of a transition, applied by the caller inside the same transaction
/// (pool events) or after commit (notifications).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    EnrollmentSettled {
        enrollment_id: EnrollmentId,
        expected: EnrollmentStatus,
        outcome: EnrollmentStatus,
    },
    PatientRequeued {
        origin: EnrollmentId,
    },
    ConfirmationRequested {
        engagement_id: EngagementId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub engagement: Engagement,
    pub events: Vec<LifecycleEvent>,
}

/// Apply `command` from `actor` to `engagement`.
///
/// `enrollment` is the pool entry the engagement was drawn from, if one is known.
pub fn apply(
    engagement: &Engagement,
    enrollment: Option<EnrollmentId>,
    actor: &Actor,
    command: LifecycleCommand,
    now: DateTime<Utc>,
    min_justification_chars: usize,
) -> Result<Transition, MatchingError> {
    let action = command.action();
    let mut next = engagement.clone();
    let mut events = Vec::new();

    match command {
        LifecycleCommand::Cancel { justification } => {
            let (engagement_outcome, enrollment_outcome) = match actor.role {
                Role::Patient if engagement.involves(actor) => (
                    EngagementStatus::CancelledByPatient,
                    EnrollmentStatus::CancelledByPatient,
                ),
                Role::Professional if engagement.involves(actor) => (
                    EngagementStatus::CancelledByProfessional,
                    EnrollmentStatus::CancelledByProfessional,
                ),
                Role::Patient | Role::Professional | Role::Admin => {
                    return Err(MatchingError::forbidden(
                        "only the engagement's patient or professional can cancel it",
                    ))
                }
            };
            require_status(engagement, EngagementStatus::Active, action)?;

            let justification = justification.trim();
            if justification.chars().count() < min_justification_chars {
                return Err(MatchingError::validation(format!(
                    "justification must have at least {min_justification_chars} characters"
                )));
            }

            next.status = engagement_outcome;
            next.cancellation_justification = Some(justification.to_string());
            next.ended_at = Some(now);

            if let Some(enrollment_id) = enrollment {
                events.push(LifecycleEvent::EnrollmentSettled {
                    enrollment_id,
                    expected: EnrollmentStatus::DrawnInProgress,
                    outcome: enrollment_outcome,
                });
                if actor.role == Role::Professional {
                    events.push(LifecycleEvent::PatientRequeued {
                        origin: enrollment_id,
                    });
                }
            }
        }
        LifecycleCommand::Complete => {
            if actor.role != Role::Professional {
                return Err(MatchingError::forbidden(
                    "only professionals can complete engagements",
                ));
            }
            if !engagement.involves(actor) {
                return Err(MatchingError::forbidden("access denied"));
            }
            require_status(engagement, EngagementStatus::Active, action)?;

            next.status = EngagementStatus::CompletedByProfessional;
            next.ended_at = Some(now);

            if let Some(enrollment_id) = enrollment {
                events.push(LifecycleEvent::EnrollmentSettled {
                    enrollment_id,
                    expected: EnrollmentStatus::DrawnInProgress,
                    outcome: EnrollmentStatus::CompletedByProfessional,
                });
            }
            events.push(LifecycleEvent::ConfirmationRequested {
                engagement_id: engagement.id,
            });
        }
        LifecycleCommand::Confirm => {
            if actor.role != Role::Patient {
                return Err(MatchingError::forbidden(
                    "only patients can confirm completion",
                ));
            }
            if !engagement.involves(actor) {
                return Err(MatchingError::forbidden("access denied"));
            }
            require_status(engagement, EngagementStatus::CompletedByProfessional, action)?;

            next.status = EngagementStatus::ConfirmedByPatient;
            next.confirmed_at = Some(now);

            if let Some(enrollment_id) = enrollment {
                events.push(LifecycleEvent::EnrollmentSettled {
                    enrollment_id,
                    expected: EnrollmentStatus::CompletedByProfessional,
                    outcome: EnrollmentStatus::Confirmed,
                });
            }
        }
    }

    Ok(Transition {
        engagement: next,
        events,
    })
}

fn require_status(
    engagement: &Engagement,
    required: EngagementStatus,
    action: StateAction,
) -> Result<(), MatchingError> {
    if engagement.status == required {
        Ok(())
    } else {
        Err(MatchingError::InvalidStateTransition {
            action,
            status: engagement.status.code(),
        })
    }
}

/// Close a completion the patient never confirmed once `grace` has elapsed since it ended.
pub fn sweep(engagement: &Engagement, now: DateTime<Utc>, grace: Duration) -> Option<Engagement> {
    let overdue = engagement.status == EngagementStatus::CompletedByProfessional
        && engagement.confirmed_at.is_none()
        && engagement
            .ended_at
            .map_or(false, |ended_at| ended_at <= now - grace);
    if !overdue {
        return None;
    }

    let mut closed = engagement.clone();
    closed.status = EngagementStatus::CompletedUnconfirmed;
    Some(closed)
}
