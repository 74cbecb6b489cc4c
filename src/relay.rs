//! Relay orchestrator: forwards cookie-authenticated calls, refreshes at most once per request,
//! and composes the browser-facing outcome.
//!
//! A relay request walks `start -> first_attempt -> (done | refreshing)`, and a successful
//! refresh leads to exactly one `retry_attempt` before `done`. The transitions themselves are
//! pure functions in [`decision`]; this module only performs the upstream calls they ask for.
//! The orchestrator holds no mutable per-session state, so concurrent requests never contend.

pub mod decision;

mod metrics;

pub use decision::{FirstAttempt, RefreshPolicy, Stage};
pub use metrics::RelayMetrics;

// std
use std::time::Duration as StdDuration;
// crates.io
use ::http::StatusCode;
// self
use crate::{
	_prelude::*,
	auth::{SessionTokens, TokenSecret},
	config::BffConfig,
	cookie::{CookieCodec, ID_TOKEN_COOKIE, InboundSession, REFRESH_TOKEN_COOKIE, SessionCookies},
	http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
	oauth::{AuthorizationClient, HttpAuthorizationClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	resource::{HttpResourceClient, Payload, ResourceClient, ResourceResponse, ResourceRoute},
};

/// JSON error body returned to the browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
	/// Stable machine-readable code.
	pub error: &'static str,
	/// Human-readable explanation.
	pub message: String,
}

/// Body of a [`RelayOutcome`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutcomeBody {
	/// No body.
	Empty,
	/// Resource server body, relayed verbatim.
	Upstream(Payload),
	/// Relay-generated error.
	Error(ErrorBody),
}

/// Everything the HTTP surface needs to answer one browser request.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayOutcome {
	/// Response status.
	pub status: StatusCode,
	/// Response body.
	pub body: OutcomeBody,
	/// Cookie triple to set, present only when this request changed the session.
	pub cookies: Option<SessionCookies>,
	/// Retry-After hint forwarded from an upstream.
	pub retry_after: Option<Duration>,
}
impl RelayOutcome {
	fn empty(status: StatusCode) -> Self {
		Self { status, body: OutcomeBody::Empty, cookies: None, retry_after: None }
	}

	fn upstream(response: ResourceResponse) -> Self {
		Self {
			status: response.status,
			body: OutcomeBody::Upstream(response.payload),
			cookies: None,
			retry_after: None,
		}
	}

	fn failure(flow: FlowKind, err: &Error) -> Self {
		let failure = decision::failure(flow, err);

		Self {
			status: failure.status,
			body: OutcomeBody::Error(ErrorBody { error: failure.code, message: failure.message }),
			cookies: None,
			retry_after: failure.retry_after,
		}
	}

	fn with_cookies(mut self, cookies: SessionCookies) -> Self {
		self.cookies = Some(cookies);

		self
	}

	/// Returns `true` when the relay itself produced an error response.
	pub fn is_failure(&self) -> bool {
		matches!(self.body, OutcomeBody::Error(_))
	}
}

/// Per-request orchestrator shared by every handler.
pub struct Relay<A = dyn AuthorizationClient, R = dyn ResourceClient>
where
	A: ?Sized + AuthorizationClient,
	R: ?Sized + ResourceClient,
{
	authorization: Arc<A>,
	resource: Arc<R>,
	codec: CookieCodec,
	refresh_policy: RefreshPolicy,
	retry_delay: StdDuration,
	metrics: Arc<RelayMetrics>,
}
impl Relay {
	/// Wires the HTTP-backed clients around one shared transport.
	pub fn from_config(config: &BffConfig) -> Result<Self> {
		let http_client = Arc::new(ReqwestHttpClient::with_timeout(config.upstream_timeout)?);
		let authorization: HttpAuthorizationClient = HttpAuthorizationClient::from_config(
			config,
			Arc::clone(&http_client),
			ReqwestTransportErrorMapper,
		);
		let resource: HttpResourceClient =
			HttpResourceClient::from_config(config, http_client, ReqwestTransportErrorMapper)?;

		let codec = CookieCodec::new(config.cookies.clone());

		Ok(Self::new(Arc::new(authorization), Arc::new(resource), codec)
			.with_refresh_policy(config.refresh_policy)
			.with_retry_delay(config.retry_delay))
	}
}
impl<A, R> Relay<A, R>
where
	A: ?Sized + AuthorizationClient,
	R: ?Sized + ResourceClient,
{
	/// Creates an orchestrator with the default refresh policy and no retry delay.
	pub fn new(authorization: Arc<A>, resource: Arc<R>, codec: CookieCodec) -> Self {
		Self {
			authorization,
			resource,
			codec,
			refresh_policy: RefreshPolicy::default(),
			retry_delay: StdDuration::ZERO,
			metrics: Default::default(),
		}
	}

	/// Overrides which resource statuses trigger a refresh.
	pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
		self.refresh_policy = policy;

		self
	}

	/// Pauses between a successful refresh and the retry.
	pub fn with_retry_delay(mut self, delay: StdDuration) -> Self {
		self.retry_delay = delay;

		self
	}

	/// Returns the cookie codec used for inbound and outbound cookies.
	pub fn codec(&self) -> &CookieCodec {
		&self.codec
	}

	/// Returns the relay counters.
	pub fn metrics(&self) -> &RelayMetrics {
		&self.metrics
	}

	/// Forwards one browser call to `route`, refreshing the session at most once.
	pub async fn relay(
		&self,
		route: ResourceRoute,
		session: &InboundSession,
		payload: &Payload,
	) -> RelayOutcome {
		const KIND: FlowKind = FlowKind::Relay;

		let span = FlowSpan::new(KIND, "relay");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_relay();

		let outcome = span.instrument(self.relay_once(route, session, payload)).await;

		finish(KIND, outcome)
	}

	/// Exchanges the authorization code carried in a plain-text body for a new session.
	pub async fn exchange_code(&self, raw_code: &str) -> RelayOutcome {
		const KIND: FlowKind = FlowKind::CodeExchange;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span
			.instrument(async move {
				let Some(code) = decision::authorization_code(raw_code) else {
					return RelayOutcome::failure(
						KIND,
						&Error::MissingCredential { credential: "code" },
					);
				};

				match self.authorization.exchange_code(code).await {
					Ok(tokens) => self.session_established(&tokens),
					Err(err) => {
						tracing::warn!(error = %err, "Authorization code exchange failed.");

						RelayOutcome::failure(KIND, &err)
					},
				}
			})
			.await;

		finish(KIND, outcome)
	}

	/// Ends the provider session and clears the cookie triple.
	///
	/// Cookies are left untouched when the provider does not confirm the logout.
	pub async fn logout(&self, session: &InboundSession) -> RelayOutcome {
		const KIND: FlowKind = FlowKind::EndSession;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span
			.instrument(async move {
				let Some(id_token) = &session.id_token else {
					return RelayOutcome::failure(
						KIND,
						&Error::MissingCredential { credential: ID_TOKEN_COOKIE },
					);
				};

				match self.authorization.end_session(id_token).await {
					Ok(()) => RelayOutcome::empty(StatusCode::OK).with_cookies(self.codec.clear()),
					Err(err) => {
						tracing::warn!(error = %err, "End session failed; keeping cookies.");

						RelayOutcome::failure(KIND, &err)
					},
				}
			})
			.await;

		finish(KIND, outcome)
	}

	/// Refreshes the session on explicit request.
	pub async fn refresh_session(&self, session: &InboundSession) -> RelayOutcome {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_session");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span
			.instrument(async move {
				let Some(refresh_token) = &session.refresh_token else {
					return RelayOutcome::failure(
						KIND,
						&Error::MissingCredential { credential: REFRESH_TOKEN_COOKIE },
					);
				};

				match self.refresh(refresh_token).await {
					Ok(tokens) => self.session_established(&tokens),
					Err(err) => RelayOutcome::failure(KIND, &err),
				}
			})
			.await;

		finish(KIND, outcome)
	}

	async fn relay_once(
		&self,
		route: ResourceRoute,
		session: &InboundSession,
		payload: &Payload,
	) -> RelayOutcome {
		const KIND: FlowKind = FlowKind::Relay;

		tracing::debug!(stage = %Stage::Start, %route, "Relay request received.");

		let (refresh_token, first) =
			match (decision::start(session), &session.refresh_token, &session.access_token) {
				(Stage::FirstAttempt, Some(refresh_token), Some(access_token)) => {
					tracing::debug!(stage = %Stage::FirstAttempt, "Calling with the presented access token.");

					(refresh_token, Some(self.resource.call(route, access_token, payload).await))
				},
				(Stage::Refreshing, Some(refresh_token), _) => {
					tracing::debug!(stage = %Stage::Refreshing, "No access token presented.");

					(refresh_token, None)
				},
				(stage, ..) => {
					tracing::debug!(%stage, "No refresh token presented.");

					return RelayOutcome::failure(
						KIND,
						&Error::MissingCredential { credential: REFRESH_TOKEN_COOKIE },
					);
				},
			};
		let attempt = match &first {
			None => FirstAttempt::Skipped,
			Some(Ok(response)) => FirstAttempt::Replied(response.status),
			Some(Err(Error::UpstreamUnreachable(err))) => {
				tracing::debug!(error = %err, "Resource server unreachable on first attempt.");

				FirstAttempt::Unreachable
			},
			Some(Err(err)) => return RelayOutcome::failure(KIND, err),
		};
		let stage = decision::after_first_attempt(self.refresh_policy, attempt);

		tracing::debug!(%stage, ?attempt, "First attempt resolved.");

		if let (Stage::Done, Some(Ok(response))) = (stage, first) {
			return RelayOutcome::upstream(response);
		}

		obs::record_refresh_trigger(match attempt {
			FirstAttempt::Replied(status) => Some(status.as_u16()),
			FirstAttempt::Skipped | FirstAttempt::Unreachable => None,
		});

		let tokens = match self.refresh(refresh_token).await {
			Ok(tokens) => tokens,
			Err(err) => return RelayOutcome::failure(KIND, &err),
		};
		let cookies = self.codec.encode(&tokens);

		if !self.retry_delay.is_zero() {
			tokio::time::sleep(self.retry_delay).await;
		}

		self.metrics.record_retry();
		tracing::debug!(stage = %Stage::RetryAttempt, %route, "Retrying with refreshed token.");

		let outcome = match self.resource.call(route, &tokens.access_token, payload).await {
			Ok(response) => RelayOutcome::upstream(response),
			Err(err) => {
				tracing::warn!(error = %err, "Retry after refresh failed.");

				RelayOutcome::failure(KIND, &err)
			},
		};

		tracing::debug!(stage = %Stage::Done, status = outcome.status.as_u16(), "Relay finished.");

		outcome.with_cookies(cookies)
	}

	async fn refresh(&self, refresh_token: &TokenSecret) -> Result<SessionTokens> {
		self.metrics.record_refresh_attempt();
		tracing::debug!(stage = %Stage::Refreshing, "Refreshing session tokens.");

		let result = self.authorization.refresh(refresh_token).await;

		match (decision::after_refresh(&result), &result) {
			(Stage::RefreshFailed, Err(err)) => {
				self.metrics.record_refresh_failure();
				tracing::warn!(stage = %Stage::RefreshFailed, error = %err, "Refresh rejected.");
			},
			(_, Err(err)) => {
				self.metrics.record_refresh_failure();
				tracing::warn!(error = %err, "Refresh could not complete.");
			},
			_ => {},
		}

		result
	}

	fn session_established(&self, tokens: &SessionTokens) -> RelayOutcome {
		RelayOutcome::empty(StatusCode::OK).with_cookies(self.codec.encode(tokens))
	}
}

fn finish(kind: FlowKind, outcome: RelayOutcome) -> RelayOutcome {
	let recorded = if outcome.is_failure() { FlowOutcome::Failure } else { FlowOutcome::Success };

	obs::record_flow_outcome(kind, recorded);

	outcome
}
