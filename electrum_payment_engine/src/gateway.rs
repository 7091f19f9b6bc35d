//! Outbound client for the Redsys REST endpoint.
//!
//! The client posts one signed envelope per call and decodes whatever comes back: a success
//! envelope with populated merchant parameters, an error envelope carrying a `SIS####` code, or
//! something unrecognizable. It never retries; retry policy belongs to the payment engine.

use std::time::Duration;

use async_trait::async_trait;
use base64::{decode, decode_config, URL_SAFE};
use log::trace;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::db_types::{PaymentParameters, PaymentRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const MAX_IDLE_PER_HOST: usize = 10;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),
    #[error("gateway call timed out")]
    Timeout,
    #[error("gateway rejected the request with code {0}")]
    ErrorCode(String),
    #[error("unrecognized gateway response: {0}")]
    Unrecognized(String),
    #[error("empty merchant parameters")]
    EmptyParameters,
    #[error("could not decode merchant parameters: {0}")]
    Decode(String),
}

/// The seam between the payment engine and the bank. Implementations must be cheap to clone; the
/// engine clones itself, gateway included, into every dispatched task.
#[async_trait]
pub trait PaymentGateway: Clone + Send + Sync + 'static {
    /// Posts a signed envelope and returns the decoded reply parameters.
    async fn send(&self, request: &PaymentRequest) -> Result<PaymentParameters, GatewayError>;
}

#[derive(Clone)]
pub struct RedsysClient {
    request_url: String,
    client: Client,
}

impl RedsysClient {
    pub fn new(request_url: &str) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { request_url: request_url.to_string(), client })
    }
}

#[async_trait]
impl PaymentGateway for RedsysClient {
    async fn send(&self, request: &PaymentRequest) -> Result<PaymentParameters, GatewayError> {
        trace!("💳️ POST {}", self.request_url);
        let response = self.client.post(&self.request_url).json(request).send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;
        let body = response.text().await.map_err(|e| GatewayError::Transport(e.to_string()))?;
        parse_reply(&body)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorCodeResponse {
    #[serde(rename = "errorCode", default)]
    code: String,
}

/// Decodes a reply body. A success envelope must carry decodable merchant parameters; failing
/// that, an `errorCode` field is surfaced as [`GatewayError::ErrorCode`]; anything else is
/// [`GatewayError::Unrecognized`] with the body kept verbatim for the log.
pub fn parse_reply(body: &str) -> Result<PaymentParameters, GatewayError> {
    if let Ok(envelope) = serde_json::from_str::<PaymentRequest>(body) {
        if !envelope.parameters.is_empty() {
            if let Ok(reply) = read_parameters(&envelope.parameters) {
                return Ok(reply);
            }
        }
    }
    if let Ok(error) = serde_json::from_str::<ErrorCodeResponse>(body) {
        if !error.code.is_empty() {
            return Err(GatewayError::ErrorCode(error.code));
        }
    }
    Err(GatewayError::Unrecognized(body.to_string()))
}

/// Base64-decodes and parses an inner `Ds_MerchantParameters` blob. Notifies encode it with the
/// URL-safe alphabet, direct replies with the standard one; both are accepted.
pub fn read_parameters(parameters: &str) -> Result<PaymentParameters, GatewayError> {
    if parameters.is_empty() {
        return Err(GatewayError::EmptyParameters);
    }
    let decoded = decode(parameters)
        .or_else(|_| decode_config(parameters, URL_SAFE))
        .map_err(|e| GatewayError::Decode(e.to_string()))?;
    serde_json::from_slice(&decoded).map_err(|e| GatewayError::Decode(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_a_success_envelope() {
        let inner = r#"{"Ds_Response":"0000","Ds_Order":"1201","Ds_Amount":"1000","Ds_TransactionType":"0"}"#;
        let body = serde_json::json!({
            "Ds_MerchantParameters": base64::encode(inner),
            "Ds_Signature": "sig",
            "Ds_SignatureVersion": "HMAC_SHA256_V1",
        })
        .to_string();
        let reply = parse_reply(&body).unwrap();
        assert_eq!(reply.response, "0000");
        assert_eq!(reply.order, "1201");
        assert_eq!(reply.amount, "1000");
    }

    #[test]
    fn surfaces_a_sis_error_code() {
        let err = parse_reply(r#"{"errorCode":"SIS0051"}"#).unwrap_err();
        assert!(matches!(err, GatewayError::ErrorCode(code) if code == "SIS0051"));
    }

    #[test]
    fn keeps_an_unrecognized_body_verbatim() {
        let err = parse_reply("<html>gateway down</html>").unwrap_err();
        assert!(matches!(err, GatewayError::Unrecognized(body) if body.contains("gateway down")));
    }

    #[test]
    fn reads_url_safe_parameters() {
        let inner = r#"{"Ds_Response":"0000","Ds_Order":"1201","Ds_Amount":"99","Ds_TransactionType":"0"}"#;
        let encoded = base64::encode_config(inner, URL_SAFE);
        let reply = read_parameters(&encoded).unwrap();
        assert_eq!(reply.amount, "99");
    }
}
