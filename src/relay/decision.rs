//! Pure stage transitions and status mapping for relay flows.

// crates.io
use ::http::StatusCode;
// self
use crate::{
	_prelude::*,
	cookie::{ACCESS_TOKEN_COOKIE, ID_TOKEN_COOKIE, InboundSession, REFRESH_TOKEN_COOKIE},
	error::TransportError,
	obs::FlowKind,
};

/// Resource statuses that trigger a token refresh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
	/// Refresh only on `401 Unauthorized`.
	#[default]
	UnauthorizedOnly,
	/// Refresh on `401 Unauthorized` and `403 Forbidden`.
	UnauthorizedOrForbidden,
}
impl RefreshPolicy {
	/// Returns `true` when `status` should trigger a refresh.
	pub fn triggers(self, status: StatusCode) -> bool {
		match self {
			Self::UnauthorizedOnly => status == StatusCode::UNAUTHORIZED,
			Self::UnauthorizedOrForbidden =>
				matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN),
		}
	}
}

/// Relay request stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
	/// Cookies read, nothing sent yet.
	Start,
	/// Resource call with the presented access token.
	FirstAttempt,
	/// Refresh grant in flight.
	Refreshing,
	/// Resource call with the refreshed access token.
	RetryAttempt,
	/// Refresh was rejected; the session is over.
	RefreshFailed,
	/// Response composed.
	Done,
}
impl Stage {
	/// Stable label used in spans and logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Start => "start",
			Self::FirstAttempt => "first_attempt",
			Self::Refreshing => "refreshing",
			Self::RetryAttempt => "retry_attempt",
			Self::RefreshFailed => "refresh_failed",
			Self::Done => "done",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Result of the first resource attempt, reduced to what the next transition needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FirstAttempt {
	/// No access token was presented, so nothing was sent.
	Skipped,
	/// The resource server answered with this status.
	Replied(StatusCode),
	/// The resource server could not be reached.
	Unreachable,
}

/// Transition out of [`Stage::Start`].
pub fn start(session: &InboundSession) -> Stage {
	match (&session.refresh_token, &session.access_token) {
		(None, _) => Stage::Done,
		(Some(_), None) => Stage::Refreshing,
		(Some(_), Some(_)) => Stage::FirstAttempt,
	}
}

/// Transition out of [`Stage::FirstAttempt`].
pub fn after_first_attempt(policy: RefreshPolicy, attempt: FirstAttempt) -> Stage {
	match attempt {
		FirstAttempt::Replied(status) if !policy.triggers(status) => Stage::Done,
		FirstAttempt::Skipped | FirstAttempt::Replied(_) | FirstAttempt::Unreachable =>
			Stage::Refreshing,
	}
}

/// Transition out of [`Stage::Refreshing`].
pub fn after_refresh<T>(outcome: &Result<T>) -> Stage {
	match outcome {
		Ok(_) => Stage::RetryAttempt,
		Err(Error::UpstreamAuth { .. }) => Stage::RefreshFailed,
		Err(_) => Stage::Done,
	}
}

/// Extracts the authorization code from a plain-text body.
///
/// Surrounding whitespace and quotes are dropped so JSON-encoded strings are accepted too.
pub fn authorization_code(raw: &str) -> Option<&str> {
	let code = raw.trim().trim_matches('"').trim();

	if code.is_empty() { None } else { Some(code) }
}

/// Client-facing failure: status, stable code, and a message free of upstream detail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
	/// Response status.
	pub status: StatusCode,
	/// Stable machine-readable code.
	pub code: &'static str,
	/// Human-readable explanation.
	pub message: String,
	/// Retry-After hint forwarded from the upstream.
	pub retry_after: Option<Duration>,
}

/// Maps an error raised during `flow` to the response the browser receives.
///
/// Session-bound flows (relay, refresh) report credential problems as `407` so the client
/// restarts its login; code exchange and logout report them as `400`.
pub fn failure(flow: FlowKind, err: &Error) -> Failure {
	let session_bound = matches!(flow, FlowKind::Relay | FlowKind::Resource | FlowKind::Refresh);
	let credential_status = if session_bound {
		StatusCode::PROXY_AUTHENTICATION_REQUIRED
	} else {
		StatusCode::BAD_REQUEST
	};
	let (status, code, message) = match err {
		Error::MissingCredential { credential } => (
			credential_status,
			"missing_credential",
			missing_credential_message(credential, session_bound),
		),
		Error::UpstreamAuth { .. } if session_bound => (
			credential_status,
			"logout",
			"The session could not be renewed; log in again.".into(),
		),
		Error::UpstreamAuth { .. } => (
			credential_status,
			"upstream_rejected",
			"The authorization server rejected the request.".into(),
		),
		Error::UpstreamUnreachable(TransportError::Timeout { .. }) => (
			StatusCode::GATEWAY_TIMEOUT,
			"upstream_timeout",
			"An upstream server did not answer in time.".into(),
		),
		Error::UpstreamUnreachable(_) => (
			StatusCode::BAD_GATEWAY,
			"upstream_unreachable",
			"An upstream server could not be reached.".into(),
		),
		Error::Transient(_) => (
			StatusCode::BAD_GATEWAY,
			"upstream_unavailable",
			"The authorization server is temporarily unavailable.".into(),
		),
		Error::Config(_) | Error::Io(_) => (
			StatusCode::INTERNAL_SERVER_ERROR,
			"internal",
			"The relay is misconfigured.".into(),
		),
	};

	Failure { status, code, message, retry_after: err.retry_after() }
}

fn missing_credential_message(credential: &str, session_bound: bool) -> String {
	match credential {
		REFRESH_TOKEN_COOKIE if session_bound => "RT not found, logout.".into(),
		ACCESS_TOKEN_COOKIE | REFRESH_TOKEN_COOKIE | ID_TOKEN_COOKIE =>
			format!("The `{credential}` cookie is required."),
		_ => format!("The `{credential}` value is required."),
	}
}
