//! Hosted-pay-page gateway integration: checksum engine, wire types, and the
//! provider client used by initiation, status checks, and reconciliation.

pub mod checksum;
pub mod error;
pub mod phonepe;
pub mod provider;
pub mod types;
pub mod utils;

pub use error::{GatewayError, GatewayResult};
pub use phonepe::{PhonePeClient, PhonePeConfig};
pub use provider::PaymentGateway;
pub use types::{
    CallbackData, CallbackEnvelope, DecodedCallback, GatewayEnvironment, GatewayStatus,
    PayPageRedirect, PayPageRequest, PaymentStatus,
};
