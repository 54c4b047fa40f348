use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::dispatch::DispatchOutcome;
use crate::errors::AppResult;
use crate::models::WebhookEvent;
use crate::webhook::{parse_event, verify_signature, DELIVERY_HEADER, EVENT_HEADER, MOCK_HEADER, SIGNATURE_HEADER};

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookResponse {
    #[schema(example = "ok")]
    pub status: &'static str,
    #[schema(example = "event processed")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DispatchOutcome>,
}

impl WebhookResponse {
    fn ok(message: impl Into<String>, outcome: Option<DispatchOutcome>) -> Self {
        Self {
            status: "ok",
            message: message.into(),
            outcome,
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Receive a GitHub webhook delivery
#[utoipa::path(
    post,
    path = "/webhook",
    tag = "Webhook",
    request_body(content = String, description = "Raw GitHub webhook payload", content_type = "application/json"),
    params(
        ("X-GitHub-Event" = String, Header, description = "deployment_review, workflow_run or ping"),
        ("X-Hub-Signature-256" = String, Header, description = "HMAC-SHA256 of the body, `sha256=<hex>`"),
        ("X-GitHub-Delivery" = Option<String>, Header, description = "Delivery GUID, used for log correlation"),
    ),
    responses(
        (status = 200, description = "Event processed", body = WebhookResponse),
        (status = 400, description = "Malformed payload, blank identity fields or unsupported event"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 409, description = "No pending deployments to approve"),
        (status = 502, description = "GitHub rejected or failed the request"),
        (status = 503, description = "Permission store unavailable"),
    )
)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookResponse>> {
    let delivery = header(&headers, DELIVERY_HEADER)
        .and_then(|value| Uuid::parse_str(value).ok())
        .unwrap_or_else(Uuid::new_v4);
    let kind = header(&headers, EVENT_HEADER).unwrap_or_default().to_string();
    let span = tracing::info_span!("webhook", %delivery, event = %kind);

    async move {
        let result = process(&state, &headers, &kind, &body).await;
        if let Err(err) = &result {
            tracing::error!(error = %err, kind = err.kind(), "webhook processing failed");
        }
        result
    }
    .instrument(span)
    .await
}

async fn process(
    state: &AppState,
    headers: &HeaderMap,
    kind: &str,
    body: &[u8],
) -> AppResult<Json<WebhookResponse>> {
    verify_signature(&state.config.webhook_secret, body, header(headers, SIGNATURE_HEADER))?;
    let event = parse_event(kind, body)?;

    let mocking = state.config.allow_mock
        && header(headers, MOCK_HEADER).is_some_and(|value| value.eq_ignore_ascii_case("true"));
    if mocking {
        tracing::info!("mocking enabled, skipping dispatch");
        return Ok(Json(WebhookResponse::ok("event processed", None)));
    }

    // cancels in-flight lookups if the request future is dropped
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let outcome = state.dispatcher.handle_event(&event, &cancel).await?;
    let message = match event {
        WebhookEvent::Ping(_) => "pong",
        _ => "event processed",
    };

    Ok(Json(WebhookResponse::ok(message, Some(outcome))))
}
