//! Fixtures shared by the integration tests: configuration helpers and scripted upstreams.

#![allow(dead_code)]

// std
pub use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};

// crates.io
pub use http::{HeaderValue, StatusCode};
pub use parking_lot::Mutex;
pub use time::Duration;
// self
pub use bff_relay::{
	auth::{SessionTokens, TokenSecret},
	config::BffConfig,
	cookie::{ACCESS_TOKEN_COOKIE, CookieCodec, ID_TOKEN_COOKIE, InboundSession, REFRESH_TOKEN_COOKIE},
	error::{Error, Result, TransientError, TransportError},
	http::{ReqwestHttpClient, ReqwestTransportErrorMapper, UpstreamFuture},
	oauth::AuthorizationClient,
	obs::FlowKind,
	relay::{OutcomeBody, Relay, RelayOutcome},
	resource::{Payload, ResourceClient, ResourceResponse, ResourceRoute},
	url::Url,
};

pub const CLIENT_ID: &str = "bff-it";
pub const CLIENT_SECRET: &str = "secret-it";
pub const CLIENT_URL: &str = "http://localhost:4200";

pub fn url(value: &str) -> Url {
	Url::parse(value).expect("Test URL should parse.")
}

/// Builds a configuration whose authorization server and resource server live at the given bases.
pub fn build_config(auth_base: &str, resource_base: &str) -> BffConfig {
	BffConfig::builder()
		.auth_server_url(url(auth_base))
		.resource_server_url(url(resource_base))
		.client_id(CLIENT_ID)
		.client_secret(CLIENT_SECRET)
		.client_url(url(CLIENT_URL))
		.upstream_timeout(StdDuration::from_secs(2))
		.build()
		.expect("Test configuration should build.")
}

pub fn build_http_client() -> Arc<ReqwestHttpClient> {
	Arc::new(
		ReqwestHttpClient::with_timeout(StdDuration::from_secs(2))
			.expect("Test HTTP client should build."),
	)
}

/// Returns the plain-HTTP base URL of a mock server.
pub fn mock_base(server: &httpmock::MockServer) -> String {
	format!("http://{}", server.address())
}

/// Returns a loopback URL on a port nobody listens on.
pub fn unreachable_base() -> String {
	let listener =
		std::net::TcpListener::bind("127.0.0.1:0").expect("Ephemeral port should be available.");
	let addr = listener.local_addr().expect("Listener address should be readable.");

	drop(listener);

	format!("http://{addr}")
}

pub fn session(access: Option<&str>, refresh: Option<&str>, id: Option<&str>) -> InboundSession {
	InboundSession {
		access_token: access.map(TokenSecret::new),
		refresh_token: refresh.map(TokenSecret::new),
		id_token: id.map(TokenSecret::new),
	}
}

pub fn issued(prefix: &str) -> SessionTokens {
	SessionTokens::builder()
		.access_token(format!("{prefix}-at"))
		.refresh_token(format!("{prefix}-rt"))
		.id_token(format!("{prefix}-it"))
		.expires_in(Duration::seconds(300))
		.refresh_expires_in(Duration::seconds(1800))
		.build()
		.expect("Scripted session tokens should build.")
}

/// How a scripted authorization server answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upstream {
	/// Issue tokens or confirm the logout.
	Accept,
	/// Reject the grant with `400 invalid_grant`.
	Reject,
	/// Refuse the connection.
	Unreachable,
	/// Answer `503` with a retry hint.
	Throttled,
}
impl Upstream {
	fn answer<T>(self, flow: FlowKind, accepted: impl FnOnce() -> T) -> Result<T> {
		match self {
			Self::Accept => Ok(accepted()),
			Self::Reject => Err(Error::UpstreamAuth {
				flow,
				status: Some(400),
				reason: "invalid_grant: Token is not active".into(),
			}),
			Self::Unreachable =>
				Err(TransportError::network(flow, std::io::Error::other("connection refused"))
					.into()),
			Self::Throttled => Err(TransientError::TokenEndpoint {
				message: "temporarily_unavailable".into(),
				status: Some(503),
				retry_after: Some(Duration::seconds(3)),
			}
			.into()),
		}
	}
}

/// Authorization server double that counts calls and records presented credentials.
pub struct FakeAuthorization {
	pub exchange: Upstream,
	pub refresh: Upstream,
	pub end_session: Upstream,
	pub exchange_calls: AtomicUsize,
	pub refresh_calls: AtomicUsize,
	pub end_session_calls: AtomicUsize,
	pub presented: Mutex<Vec<String>>,
}
impl FakeAuthorization {
	pub fn new(script: Upstream) -> Self {
		Self {
			exchange: script,
			refresh: script,
			end_session: script,
			exchange_calls: AtomicUsize::new(0),
			refresh_calls: AtomicUsize::new(0),
			end_session_calls: AtomicUsize::new(0),
			presented: Mutex::new(Vec::new()),
		}
	}

	pub fn exchange_calls(&self) -> usize {
		self.exchange_calls.load(Ordering::SeqCst)
	}

	pub fn refresh_calls(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}

	pub fn end_session_calls(&self) -> usize {
		self.end_session_calls.load(Ordering::SeqCst)
	}

	pub fn presented(&self) -> Vec<String> {
		self.presented.lock().clone()
	}
}
impl AuthorizationClient for FakeAuthorization {
	fn exchange_code<'a>(&'a self, code: &'a str) -> UpstreamFuture<'a, SessionTokens> {
		self.exchange_calls.fetch_add(1, Ordering::SeqCst);
		self.presented.lock().push(code.to_owned());

		let result = self.exchange.answer(FlowKind::CodeExchange, || issued("login"));

		Box::pin(async move { result })
	}

	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> UpstreamFuture<'a, SessionTokens> {
		self.refresh_calls.fetch_add(1, Ordering::SeqCst);
		self.presented.lock().push(refresh_token.expose().to_owned());

		let result = self.refresh.answer(FlowKind::Refresh, || issued("renewed"));

		Box::pin(async move { result })
	}

	fn end_session<'a>(&'a self, id_token: &'a TokenSecret) -> UpstreamFuture<'a, ()> {
		self.end_session_calls.fetch_add(1, Ordering::SeqCst);
		self.presented.lock().push(id_token.expose().to_owned());

		let result = self.end_session.answer(FlowKind::EndSession, || ());

		Box::pin(async move { result })
	}
}

/// One scripted resource server answer.
#[derive(Clone, Debug)]
pub enum Reply {
	Status(StatusCode, &'static str),
	Unreachable,
}

/// Call observed by [`FakeResource`].
#[derive(Clone, Debug)]
pub struct ResourceCall {
	pub route: ResourceRoute,
	pub access_token: String,
	pub payload: Payload,
}

/// Resource server double answering from a queue of scripted replies.
#[derive(Default)]
pub struct FakeResource {
	replies: Mutex<VecDeque<Reply>>,
	calls: Mutex<Vec<ResourceCall>>,
}
impl FakeResource {
	pub fn replying(replies: impl IntoIterator<Item = Reply>) -> Self {
		Self { replies: Mutex::new(replies.into_iter().collect()), calls: Default::default() }
	}

	pub fn calls(&self) -> Vec<ResourceCall> {
		self.calls.lock().clone()
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().len()
	}
}
impl ResourceClient for FakeResource {
	fn call<'a>(
		&'a self,
		route: ResourceRoute,
		access_token: &'a TokenSecret,
		payload: &'a Payload,
	) -> UpstreamFuture<'a, ResourceResponse> {
		self.calls.lock().push(ResourceCall {
			route,
			access_token: access_token.expose().to_owned(),
			payload: payload.clone(),
		});

		let reply = self
			.replies
			.lock()
			.pop_front()
			.unwrap_or(Reply::Status(StatusCode::INTERNAL_SERVER_ERROR, "unscripted call"));
		let result = match reply {
			Reply::Status(status, body) => Ok(ResourceResponse {
				status,
				payload: Payload::new(Some(HeaderValue::from_static("application/json")), body),
			}),
			Reply::Unreachable => Err(TransportError::network(
				FlowKind::Resource,
				std::io::Error::other("connection refused"),
			)
			.into()),
		};

		Box::pin(async move { result })
	}
}

/// Builds a relay over the given doubles with default cookie settings.
pub fn build_relay(
	authorization: &Arc<FakeAuthorization>,
	resource: &Arc<FakeResource>,
) -> Relay<FakeAuthorization, FakeResource> {
	Relay::new(Arc::clone(authorization), Arc::clone(resource), CookieCodec::default())
}

/// Returns the cookie values set by `outcome`, in `AT`, `RT`, `IT` order.
pub fn cookie_values(outcome: &RelayOutcome) -> Option<Vec<String>> {
	outcome
		.cookies
		.as_ref()
		.map(|cookies| cookies.iter().map(|cookie| cookie.value().to_owned()).collect())
}

pub fn error_code(outcome: &RelayOutcome) -> Option<&'static str> {
	match &outcome.body {
		OutcomeBody::Error(body) => Some(body.error),
		_ => None,
	}
}
