//! The session token triple and its validating builder.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Errors produced by [`SessionTokensBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionTokensBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when no id token value was provided.
	#[error("ID token is required.")]
	MissingIdToken,
	/// Issued when the access token lifetime was not configured.
	#[error("Access token lifetime (expires_in) is required.")]
	MissingExpiresIn,
	/// Issued when the access token lifetime is zero or negative.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}

/// Tokens issued by the authorization server for one browser session.
///
/// The three secrets always travel together; the cookie codec turns them into the
/// `AT`/`RT`/`IT` cookie triple.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
	/// Short-lived bearer credential presented to resource servers.
	pub access_token: TokenSecret,
	/// Credential exchanged for a new triple.
	pub refresh_token: TokenSecret,
	/// Identity assertion used as the end-session hint.
	pub id_token: TokenSecret,
	/// Access token lifetime; the id token shares it.
	pub expires_in: Duration,
	/// Refresh token lifetime, when the provider bounds it.
	pub refresh_expires_in: Option<Duration>,
	/// Token type reported by the provider (normally `Bearer`).
	pub token_type: Option<String>,
	/// Granted scopes, space delimited.
	pub scope: Option<String>,
	/// Provider session identifier.
	pub session_state: Option<String>,
}
impl SessionTokens {
	/// Returns a builder for assembling a validated triple.
	pub fn builder() -> SessionTokensBuilder {
		SessionTokensBuilder::default()
	}
}
impl Debug for SessionTokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTokens")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("id_token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.field("refresh_expires_in", &self.refresh_expires_in)
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.field("session_state", &self.session_state)
			.finish()
	}
}

/// Builder for [`SessionTokens`].
#[derive(Clone, Debug, Default)]
pub struct SessionTokensBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	id_token: Option<TokenSecret>,
	expires_in: Option<Duration>,
	refresh_expires_in: Option<Duration>,
	token_type: Option<String>,
	scope: Option<String>,
	session_state: Option<String>,
}
impl SessionTokensBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token only when none has been set yet.
	pub fn refresh_token_or(mut self, fallback: &TokenSecret) -> Self {
		if self.refresh_token.is_none() {
			self.refresh_token = Some(fallback.clone());
		}

		self
	}

	/// Provides the id token value.
	pub fn id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the access token lifetime.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets the refresh token lifetime; zero or negative values mean "unbounded".
	pub fn refresh_expires_in(mut self, duration: Duration) -> Self {
		self.refresh_expires_in = duration.is_positive().then_some(duration);

		self
	}

	/// Records the token type reported by the provider.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Records the granted scopes.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Records the provider session identifier.
	pub fn session_state(mut self, session_state: impl Into<String>) -> Self {
		self.session_state = Some(session_state.into());

		self
	}

	/// Consumes the builder and produces a [`SessionTokens`] triple.
	pub fn build(self) -> Result<SessionTokens, SessionTokensBuilderError> {
		let access_token =
			self.access_token.ok_or(SessionTokensBuilderError::MissingAccessToken)?;
		let refresh_token =
			self.refresh_token.ok_or(SessionTokensBuilderError::MissingRefreshToken)?;
		let id_token = self.id_token.ok_or(SessionTokensBuilderError::MissingIdToken)?;
		let expires_in = self.expires_in.ok_or(SessionTokensBuilderError::MissingExpiresIn)?;

		if !expires_in.is_positive() {
			return Err(SessionTokensBuilderError::NonPositiveExpiresIn);
		}

		Ok(SessionTokens {
			access_token,
			refresh_token,
			id_token,
			expires_in,
			refresh_expires_in: self.refresh_expires_in,
			token_type: self.token_type,
			scope: self.scope,
			session_state: self.session_state,
		})
	}
}
