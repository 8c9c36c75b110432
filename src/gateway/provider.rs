use crate::gateway::error::GatewayResult;
use crate::gateway::types::{DecodedCallback, GatewayStatus, PayPageRedirect, PayPageRequest};
use async_trait::async_trait;

/// Seam between the payment core and the hosted-pay-page provider.
///
/// The production implementation is [`crate::gateway::phonepe::PhonePeClient`];
/// tests substitute an in-memory double.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted-page payment and return the URL the user must be
    /// redirected to.
    async fn create_payment(&self, request: PayPageRequest) -> GatewayResult<PayPageRedirect>;

    /// Query the provider for the current state of a transaction.
    async fn check_status(&self, transaction_id: &str) -> GatewayResult<GatewayStatus>;

    /// Verify a webhook body against the provider-supplied checksum header.
    fn verify_callback(&self, body_base64: &str, signature: &str) -> bool;

    /// Decode and schema-validate a verified webhook body.
    fn decode_callback(&self, body_base64: &str) -> GatewayResult<DecodedCallback>;
}
