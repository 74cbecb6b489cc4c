//! Relay-level error types shared by the codec, upstream clients, and orchestrator.

// self
use crate::{_prelude::*, auth::SessionTokensBuilderError, config::BffConfigError, obs::FlowKind};

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration or request construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Upstream answered, but not with anything usable; safe to retry later.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Upstream could not be reached (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	UpstreamUnreachable(#[from] TransportError),
	/// Listener or runtime I/O failure outside any upstream call.
	#[error("I/O error occurred while serving: {0}.")]
	Io(#[from] std::io::Error),

	/// A credential required by the flow was not supplied by the browser.
	#[error("Required credential `{credential}` is missing.")]
	MissingCredential {
		/// Cookie key or request field that was absent.
		credential: &'static str,
	},
	/// Authorization server rejected a grant or an end-session request.
	#[error("Authorization server rejected the {flow} request: {reason}.")]
	UpstreamAuth {
		/// Flow that issued the rejected request.
		flow: FlowKind,
		/// HTTP status code returned by the authorization server, when available.
		status: Option<u16>,
		/// Provider-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// HTTP status reported by the upstream, when the failure carries one.
	pub fn upstream_status(&self) -> Option<u16> {
		match self {
			Self::UpstreamAuth { status, .. } => *status,
			Self::Transient(TransientError::TokenEndpoint { status, .. })
			| Self::Transient(TransientError::TokenResponseParse { status, .. })
			| Self::Transient(TransientError::UnexpectedStatus { status, .. }) => *status,
			_ => None,
		}
	}

	/// Retry-After hint forwarded from the upstream, when supplied.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Transient(TransientError::TokenEndpoint { retry_after, .. })
			| Self::Transient(TransientError::UnexpectedStatus { retry_after, .. }) => *retry_after,
			_ => None,
		}
	}
}

/// Configuration and request construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] ::http::Error),
	/// Configured endpoint cannot be used to build an upstream URL.
	#[error("The {endpoint} endpoint is invalid.")]
	InvalidEndpoint {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configuration values failed validation.
	#[error(transparent)]
	Invalid(#[from] BffConfigError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Upstream replies that could not be used (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint accepted the grant but omitted part of the session.
	#[error("Token endpoint response is incomplete.")]
	IncompleteTokenResponse(#[from] SessionTokensBuilderError),
	/// Authorization server answered an end-session call with a server-side failure.
	#[error("The {flow} endpoint answered with status {status:?}.")]
	UnexpectedStatus {
		/// Flow that issued the request.
		flow: FlowKind,
		/// HTTP status code returned by the upstream.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {flow} endpoint.")]
	Network {
		/// Flow that issued the request.
		flow: FlowKind,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The upstream did not answer within the configured timeout.
	#[error("Request to the {flow} endpoint timed out.")]
	Timeout {
		/// Flow that issued the request.
		flow: FlowKind,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(flow: FlowKind, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { flow, source: Box::new(src) }
	}

	/// Returns `true` when the upstream timed out rather than refusing the connection.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}
