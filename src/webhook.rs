//! Webhook ingress: signature validation and typed event parsing.

use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use sha2::Sha256;

use crate::errors::{AppError, AppResult};
use crate::models::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";
pub const MOCK_HEADER: &str = "x-mock-enabled";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Checks `X-Hub-Signature-256` against the raw request body.
///
/// The comparison is constant-time (`Mac::verify_slice`).
pub fn verify_signature(secret: &[u8], body: &[u8], signature: Option<&str>) -> AppResult<()> {
    let signature = signature
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::unauthorized("missing X-Hub-Signature-256 header"))?;

    let digest = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| AppError::unauthorized("signature must use sha256"))?;
    let expected = hex::decode(digest).map_err(|_| AppError::unauthorized("signature is not valid hex"))?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|err| AppError::internal(format!("invalid webhook secret: {err}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::unauthorized("signature does not match payload"))
}

/// Hex signature in the header format GitHub sends. Handy for tests and
/// local replay tooling.
pub fn sign(secret: &[u8], body: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|err| AppError::internal(format!("invalid webhook secret: {err}")))?;
    mac.update(body);
    Ok(format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes())))
}

/// Parses a delivery according to its `X-GitHub-Event` kind.
pub fn parse_event(kind: &str, body: &[u8]) -> AppResult<WebhookEvent> {
    match kind.trim() {
        "deployment_review" => decode(kind, body).map(WebhookEvent::DeploymentReview),
        "workflow_run" => decode(kind, body).map(WebhookEvent::WorkflowRun),
        "ping" => decode(kind, body).map(WebhookEvent::Ping),
        "" => Err(AppError::bad_request("missing X-GitHub-Event header")),
        other => Err(AppError::unsupported_event(format!("unsupported event type {other}"))),
    }
}

fn decode<T: DeserializeOwned>(kind: &str, body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request(format!("failed to parse {kind} payload: {err}")))
}
