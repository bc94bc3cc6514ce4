//! Payment processor integrations
//!
//! `StripeProcessor` talks to the Stripe REST API with form-encoded requests.
//! `DummyProcessor` fabricates sessions and accounts for local runs without
//! processor credentials; it is only constructed when sandbox mode is
//! explicitly enabled outside production.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::error::BookingError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Parameters of a hosted checkout with a split to a connected account
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub booking_id: Option<i64>,
    pub product_name: String,
    pub description: String,
    pub currency: String,
    pub gross: i64,
    pub application_fee: i64,
    pub destination: String,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(String, String)>,
}

/// Session created by the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<ProcessorSession, BookingError>;

    /// Whether the processor reports the session as paid
    async fn is_session_paid(&self, session_id: &str) -> Result<bool, BookingError>;

    /// Close an unpaid session so it can no longer be paid
    async fn expire_session(&self, session_id: &str) -> Result<(), BookingError>;

    /// Create a connected payout account and return its id
    async fn create_payout_account(
        &self,
        user_id: Uuid,
        email: Option<&str>,
    ) -> Result<String, BookingError>;

    /// Hosted onboarding link for a connected account
    async fn onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String, BookingError>;

    fn is_sandbox(&self) -> bool;
}

#[derive(Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
}

#[derive(Deserialize)]
struct StripeAccount {
    id: String,
}

#[derive(Deserialize)]
struct StripeAccountLink {
    url: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Stripe Checkout and Connect client
#[derive(Clone)]
pub struct StripeProcessor {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeProcessor {
    pub fn new(api_base: &str, secret_key: &str) -> Result<Self, BookingError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, BookingError> {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;

        parse_response(response).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, BookingError> {
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        parse_response(response).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BookingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = response
        .json::<StripeErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error.message)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    tracing::error!(status = status.as_u16(), error = %message, "Stripe request failed");
    Err(BookingError::Processor(message))
}

fn field(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Form fields of `POST /v1/checkout/sessions`
pub fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        field("mode", "payment"),
        field("payment_method_types[0]", "card"),
        field("line_items[0][quantity]", 1),
        field("line_items[0][price_data][currency]", &request.currency),
        field("line_items[0][price_data][unit_amount]", request.gross),
        field(
            "line_items[0][price_data][product_data][name]",
            &request.product_name,
        ),
        field(
            "line_items[0][price_data][product_data][description]",
            &request.description,
        ),
        field(
            "payment_intent_data[application_fee_amount]",
            request.application_fee,
        ),
        field(
            "payment_intent_data[transfer_data][destination]",
            &request.destination,
        ),
        field("success_url", &request.success_url),
        field("cancel_url", &request.cancel_url),
    ];

    if let Some(email) = &request.customer_email {
        form.push(field("customer_email", email));
    }

    for (key, value) in &request.metadata {
        form.push(field(&format!("metadata[{}]", key), value));
        form.push(field(
            &format!("payment_intent_data[metadata][{}]", key),
            value,
        ));
    }

    form
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<ProcessorSession, BookingError> {
        let session: StripeSession = self
            .post_form("/v1/checkout/sessions", &checkout_form(request))
            .await?;

        let url = session.url.ok_or_else(|| {
            BookingError::Processor("Checkout session has no redirect URL".to_string())
        })?;

        tracing::info!(
            session_id = %session.id,
            booking_id = ?request.booking_id,
            gross = request.gross,
            application_fee = request.application_fee,
            "Stripe checkout session created"
        );

        Ok(ProcessorSession { id: session.id, url })
    }

    async fn is_session_paid(&self, session_id: &str) -> Result<bool, BookingError> {
        let session: StripeSession = self
            .get_json(&format!("/v1/checkout/sessions/{}", session_id))
            .await?;

        Ok(session.payment_status.as_deref() == Some("paid"))
    }

    async fn expire_session(&self, session_id: &str) -> Result<(), BookingError> {
        // Fails for a session that completed in the meantime
        let _: StripeSession = self
            .post_form(&format!("/v1/checkout/sessions/{}/expire", session_id), &[])
            .await?;
        Ok(())
    }

    async fn create_payout_account(
        &self,
        user_id: Uuid,
        email: Option<&str>,
    ) -> Result<String, BookingError> {
        let mut form = vec![
            field("type", "express"),
            field("country", "US"),
            field("capabilities[card_payments][requested]", true),
            field("capabilities[transfers][requested]", true),
            field("metadata[user_id]", user_id),
        ];
        if let Some(email) = email {
            form.push(field("email", email));
        }

        let account: StripeAccount = self.post_form("/v1/accounts", &form).await?;
        tracing::info!(user_id = %user_id, account_id = %account.id, "Stripe Connect account created");

        Ok(account.id)
    }

    async fn onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String, BookingError> {
        let form = vec![
            field("account", account_id),
            field("refresh_url", refresh_url),
            field("return_url", return_url),
            field("type", "account_onboarding"),
        ];

        let link: StripeAccountLink = self.post_form("/v1/account_links", &form).await?;
        Ok(link.url)
    }

    fn is_sandbox(&self) -> bool {
        false
    }
}

/// Sandbox processor that never leaves the process
#[derive(Debug, Clone)]
pub struct DummyProcessor {
    public_origin: String,
}

impl DummyProcessor {
    pub fn new(public_origin: &str) -> Self {
        Self {
            public_origin: public_origin.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentProcessor for DummyProcessor {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<ProcessorSession, BookingError> {
        let id = format!("dummy_session_{}", Uuid::new_v4().simple());
        let booking_param = request
            .booking_id
            .map(|id| format!("&booking_id={}", id))
            .unwrap_or_default();
        let url = format!(
            "{}/payments/success?session_id={}{}&dummy=true",
            self.public_origin, id, booking_param
        );

        tracing::warn!(session_id = %id, booking_id = ?request.booking_id, "Sandbox checkout session fabricated");

        Ok(ProcessorSession { id, url })
    }

    async fn is_session_paid(&self, session_id: &str) -> Result<bool, BookingError> {
        Ok(session_id.starts_with("dummy_session_"))
    }

    async fn expire_session(&self, session_id: &str) -> Result<(), BookingError> {
        tracing::debug!(session_id, "Sandbox session expired");
        Ok(())
    }

    async fn create_payout_account(
        &self,
        user_id: Uuid,
        _email: Option<&str>,
    ) -> Result<String, BookingError> {
        let simple = user_id.simple().to_string();
        Ok(format!("acct_dummy_{}", &simple[..8]))
    }

    async fn onboarding_link(
        &self,
        _account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> Result<String, BookingError> {
        Ok(format!(
            "{}/profile?stripe_connected=1&dummy=true",
            self.public_origin
        ))
    }

    fn is_sandbox(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            booking_id: Some(9),
            product_name: "Tent - Rental Booking".to_string(),
            description: "Rental booking from 2026-06-01 to 2026-06-03".to_string(),
            currency: "usd".to_string(),
            gross: 1000,
            application_fee: 100,
            destination: "acct_123".to_string(),
            customer_email: Some("b@example.com".to_string()),
            success_url: "https://app.test/payments/success".to_string(),
            cancel_url: "https://app.test/products/1".to_string(),
            metadata: vec![("booking_id".to_string(), "9".to_string())],
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_checkout_form_carries_split() {
        let form = checkout_form(&request());
        assert_eq!(
            value(&form, "payment_intent_data[application_fee_amount]"),
            Some("100")
        );
        assert_eq!(
            value(&form, "payment_intent_data[transfer_data][destination]"),
            Some("acct_123")
        );
        assert_eq!(
            value(&form, "line_items[0][price_data][unit_amount]"),
            Some("1000")
        );
        assert_eq!(value(&form, "metadata[booking_id]"), Some("9"));
        assert_eq!(value(&form, "customer_email"), Some("b@example.com"));
    }

    #[tokio::test]
    async fn test_dummy_session_url() {
        let processor = DummyProcessor::new("https://app.test/");
        let session = processor.create_checkout(&request()).await.unwrap();

        assert!(session.id.starts_with("dummy_session_"));
        assert_eq!(
            session.url,
            format!(
                "https://app.test/payments/success?session_id={}&booking_id=9&dummy=true",
                session.id
            )
        );
        assert!(processor.is_session_paid(&session.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_dummy_account_uses_user_prefix() {
        let processor = DummyProcessor::new("https://app.test");
        let user_id = Uuid::parse_str("1234abcd-0000-4000-8000-000000000000").unwrap();
        let account = processor.create_payout_account(user_id, None).await.unwrap();
        assert_eq!(account, "acct_dummy_1234abcd");
    }
}
