//! Lottery matching of patients with professionals.
//!
//! Patients hold pool entries per specialty and location, professionals draw one eligible
//! entry uniformly at random, and the resulting engagement moves through cancellation,
//! completion, and confirmation. Every state change runs as one [`MatchStore`] transaction;
//! notifications go out only after it commits.

pub mod clock;
pub mod directory;
pub mod domain;
pub mod draw;
pub mod error;
pub mod identity;
pub mod labels;
pub mod lifecycle;
pub mod notify;
pub(crate) mod pool;
pub mod repository;
pub mod router;
pub mod service;
pub mod views;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::{
    DirectoryError, DirectorySeed, IdentityDirectory, InMemoryDirectory, PatientProfile,
    ProfessionalProfile,
};
pub use domain::{
    Actor, Engagement, EngagementId, EngagementStatus, Enrollment, EnrollmentId,
    EnrollmentRequest, EnrollmentStatus, Role, StateAction, UserId,
};
pub use draw::{CandidatePicker, UniformPicker};
pub use error::MatchingError;
pub use identity::IdentityRejection;
pub use labels::StatusLabels;
pub use lifecycle::{LifecycleCommand, LifecycleEvent, Transition};
pub use notify::{Notification, NotificationTemplates, Notifier, NotifyError};
pub use repository::{InMemoryMatchStore, Ledger, MatchStore, RepositoryError};
pub use router::matching_router;
pub use service::{
    CancellationOutcome, DrawOutcome, EngagementDetail, EngagementSummary, MatchingService,
    SweepReport,
};
pub use views::{
    CancellationView, DrawView, EngagementDetailView, EngagementSummaryView, EnrollmentView,
};
