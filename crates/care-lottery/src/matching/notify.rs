use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::directory::{PatientProfile, ProfessionalProfile};
use super::domain::{Engagement, EngagementId, Enrollment};

/// Outbound message handed to the notification sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub destination: String,
    pub subject: String,
    pub body: String,
}

/// Delivery channel for patient notifications (e-mail in production).
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification sender is not configured")]
    NotConfigured,
}

/// Deliver a message after its transaction committed. Failures are logged, never returned.
pub(crate) fn dispatch<N>(notifier: &N, notification: Notification)
where
    N: Notifier + ?Sized,
{
    match notifier.send(&notification) {
        Ok(()) => info!(
            destination = %notification.destination,
            subject = %notification.subject,
            "notification sent"
        ),
        Err(error) => warn!(
            destination = %notification.destination,
            subject = %notification.subject,
            %error,
            "notification failed; state change kept"
        ),
    }
}

/// Message bodies for draw and completion notices.
#[derive(Debug, Clone)]
pub struct NotificationTemplates {
    public_base_url: String,
    confirmation_grace_days: i64,
    signature: String,
}

impl NotificationTemplates {
    pub fn new(public_base_url: impl Into<String>, confirmation_grace_days: i64) -> Self {
        Self {
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            confirmation_grace_days,
            signature: "Atendimento Solidário team".to_string(),
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    /// Where the patient confirms a completed engagement.
    pub fn confirmation_reference(&self, engagement: EngagementId) -> String {
        format!(
            "{}/api/v1/engagement/{}/confirm",
            self.public_base_url, engagement
        )
    }

    pub fn drawn(&self, patient: &PatientProfile, enrollment: &Enrollment) -> Notification {
        Notification {
            destination: patient.email.clone(),
            subject: "You were drawn!".to_string(),
            body: format!(
                "Hello {},\n\n\
                 You were drawn for care in the specialty: {}.\n\
                 Location: {}/{}.\n\
                 Please wait for the professional to contact you.\n\n\
                 Regards,\n{}",
                patient.name,
                enrollment.specialty,
                enrollment.municipality,
                enrollment.state,
                self.signature
            ),
        }
    }

    pub fn completion_requested(
        &self,
        patient: &PatientProfile,
        professional: Option<&ProfessionalProfile>,
        engagement: &Engagement,
    ) -> Notification {
        let by = professional
            .map(|professional| professional.name.as_str())
            .unwrap_or("The professional");
        Notification {
            destination: patient.email.clone(),
            subject: "Please confirm your care was completed".to_string(),
            body: format!(
                "Hello {},\n\n\
                 {} marked your care in {} as completed.\n\
                 Please confirm the completion at:\n\n{}\n\n\
                 Completions left unconfirmed for {} days are closed without confirmation \
                 and may restrict your participation in future draws.\n\n\
                 Regards,\n{}",
                patient.name,
                by,
                engagement.specialty,
                self.confirmation_reference(engagement.id),
                self.confirmation_grace_days,
                self.signature
            ),
        }
    }
}
