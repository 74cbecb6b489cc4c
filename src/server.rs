//! HTTP surface: `/bff` routes, CORS for the browser origin, and request tracing.
//!
//! Every handler hands its flow to a spawned task and awaits the join handle, so a browser that
//! disconnects mid-request cannot cancel a refresh whose rotated tokens were already issued.

// crates.io
use axum::{
	Json, Router,
	extract::State,
	http::{
		HeaderMap, HeaderValue, StatusCode,
		header::{CONTENT_TYPE, RETRY_AFTER, SET_COOKIE},
	},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use tokio::net::TcpListener;
use tower_http::{
	cors::{AllowHeaders, AllowMethods, CorsLayer},
	trace::TraceLayer,
};
// self
use crate::{
	_prelude::*,
	config::BffConfig,
	error::ConfigError,
	relay::{OutcomeBody, Relay, RelayOutcome},
	resource::{Payload, ResourceRoute},
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
	relay: Arc<Relay>,
}

/// Builds the `/bff` router around `relay`, allowing credentialed CORS from `client_origin`.
pub fn router(relay: Arc<Relay>, client_origin: HeaderValue) -> Router {
	let cors = CorsLayer::new()
		.allow_origin(client_origin)
		.allow_credentials(true)
		.allow_headers(AllowHeaders::mirror_request())
		.allow_methods(AllowMethods::mirror_request());
	let bff = Router::new()
		.route("/data", get(user_data).post(user_data))
		.route("/admin_data", get(admin_data).post(admin_data))
		.route("/token", post(token))
		.route("/logout", get(logout))
		.route("/refresh", get(refresh));

	Router::new()
		.nest("/bff", bff)
		.layer(cors)
		.layer(TraceLayer::new_for_http())
		.with_state(AppState { relay })
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn serve(config: BffConfig) -> Result<()> {
	let origin = HeaderValue::from_str(&config.client_origin())
		.map_err(|e| ConfigError::from(::http::Error::from(e)))?;
	let relay = Arc::new(Relay::from_config(&config)?);
	let listener = TcpListener::bind(config.listen_addr).await?;

	tracing::info!(addr = %listener.local_addr()?, "BFF relay listening.");

	axum::serve(listener, router(relay, origin)).with_graceful_shutdown(shutdown_signal()).await?;

	tracing::info!("BFF relay stopped.");

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Ctrl-C handler could not be installed.");
		std::future::pending::<()>().await;
	}
}

async fn user_data(
	State(state): State<AppState>,
	jar: CookieJar,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	forward(state, ResourceRoute::UserData, jar, headers, body).await
}

async fn admin_data(
	State(state): State<AppState>,
	jar: CookieJar,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	forward(state, ResourceRoute::AdminData, jar, headers, body).await
}

async fn token(State(state): State<AppState>, body: String) -> Response {
	let relay = state.relay;

	shielded(async move { relay.exchange_code(&body).await }).await
}

async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
	let relay = state.relay;
	let session = relay.codec().read(&jar);

	shielded(async move { relay.logout(&session).await }).await
}

async fn refresh(State(state): State<AppState>, jar: CookieJar) -> Response {
	let relay = state.relay;
	let session = relay.codec().read(&jar);

	shielded(async move { relay.refresh_session(&session).await }).await
}

async fn forward(
	state: AppState,
	route: ResourceRoute,
	jar: CookieJar,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let relay = state.relay;
	let session = relay.codec().read(&jar);
	let payload = Payload::new(headers.get(CONTENT_TYPE).cloned(), body);

	shielded(async move { relay.relay(route, &session, &payload).await }).await
}

async fn shielded<F>(flow: F) -> Response
where
	F: 'static + Send + Future<Output = RelayOutcome>,
{
	match tokio::spawn(flow).await {
		Ok(outcome) => outcome.into_response(),
		Err(e) => {
			tracing::error!(error = %e, "Relay task did not complete.");

			StatusCode::INTERNAL_SERVER_ERROR.into_response()
		},
	}
}

impl IntoResponse for RelayOutcome {
	fn into_response(self) -> Response {
		let mut response = match self.body {
			OutcomeBody::Empty => self.status.into_response(),
			OutcomeBody::Upstream(payload) => {
				let mut response = (self.status, payload.body).into_response();
				let headers = response.headers_mut();

				match payload.content_type {
					Some(content_type) => headers.insert(CONTENT_TYPE, content_type),
					None => headers.remove(CONTENT_TYPE),
				};

				response
			},
			OutcomeBody::Error(body) => (self.status, Json(body)).into_response(),
		};

		if let Some(retry_after) = self.retry_after {
			let secs = u64::try_from(retry_after.whole_seconds()).unwrap_or_default();

			response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
		}

		if let Some(cookies) = self.cookies {
			let headers = response.headers_mut();

			for value in cookies.header_values() {
				match HeaderValue::from_str(&value) {
					Ok(value) => {
						headers.append(SET_COOKIE, value);
					},
					Err(e) => tracing::error!(error = %e, "Session cookie is not a valid header value."),
				}
			}
		}

		response
	}
}
