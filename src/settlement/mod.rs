//! Split-payment settlement through a connected-account processor

pub mod fees;
pub mod gateway;
pub mod model;
pub mod processor;

pub use fees::{FeeSplit, DEFAULT_FEE_BPS};
pub use gateway::{SettlementGateway, SettlementSettings};
pub use model::{
    CheckoutSession, CreateSessionRequest, PaymentOutcome, PayoutAccount, PayoutStatus,
    UpdatePaymentStatusRequest,
};
pub use processor::{DummyProcessor, PaymentProcessor, StripeProcessor};
