//! Business logic: initiation, callback processing, status reconciliation
//! and the completion event sink.

pub mod callback;
pub mod initiation;
pub mod notification;
pub mod reconciler;

pub use callback::{CallbackAck, CallbackProcessor};
pub use initiation::{InitiatedPayment, InitiationRequest, InitiationService};
pub use notification::{ConfirmationMailer, EventSink, NotificationJob, PgNotificationQueue};
pub use reconciler::{ReconcileOutcome, StatusReconciler};
