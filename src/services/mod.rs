//! Business logic for the payment reconciliation core.

pub mod initiation;
pub mod payment_status;
pub mod status_resolver;

#[cfg(test)]
pub mod test_support;

pub use initiation::{InitiatePayment, InitiatedPayment, PaymentInitiationService};
pub use payment_status::{ActiveCheckResult, PaymentStatusService, TrustedPaymentStatus};
pub use status_resolver::{ProviderResolution, ResolutionOutcome, StatusResolver};
