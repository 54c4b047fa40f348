use utoipa::openapi::server::Server;
use utoipa::OpenApi;

use crate::dispatch::DispatchOutcome;
use crate::models::{ApprovedEnvironment, PendingDeploymentCandidate};
use crate::routes::{health, webhook};

#[derive(OpenApi)]
#[openapi(
	paths(health::health, webhook::receive),
	components(
		schemas(
			health::HealthResponse,
			webhook::WebhookResponse,
			DispatchOutcome,
			ApprovedEnvironment,
			PendingDeploymentCandidate
		)
	),
	tags(
		(name = "Webhook", description = "GitHub deployment review webhook"),
		(name = "Health", description = "Liveness and database reachability")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = ApiDoc::openapi();
	doc.servers = Some(vec![Server::new(format!("http://localhost:{port}"))]);
	Ok(doc)
}
