// std
use std::{net::SocketAddr, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::{
		BffConfig, ClientRegistration, DEFAULT_LISTEN_ADDR, DEFAULT_UPSTREAM_TIMEOUT,
		UpstreamEndpoints,
	},
	cookie::CookieSettings,
	relay::RefreshPolicy,
};

/// Errors raised while assembling or validating a [`BffConfig`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum BffConfigError {
	/// A required setting was never provided.
	#[error("Missing required setting `{setting}`.")]
	MissingSetting {
		/// Setting name.
		setting: &'static str,
	},
	/// A required string setting is empty or whitespace.
	#[error("Setting `{setting}` must not be blank.")]
	BlankSetting {
		/// Setting name.
		setting: &'static str,
	},
	/// Upstream and client URLs must be plain web URLs.
	#[error("The {endpoint} URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which URL failed validation.
		endpoint: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// A URL could not be parsed or derived from its base.
	#[error("The {endpoint} URL is malformed.")]
	MalformedUrl {
		/// Which URL failed to parse.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A duration setting must be greater than zero.
	#[error("Setting `{setting}` must be a positive duration.")]
	NonPositiveDuration {
		/// Setting name.
		setting: &'static str,
	},
	/// A required environment variable is unset.
	#[error("Environment variable `{variable}` is required.")]
	MissingVariable {
		/// Variable name.
		variable: &'static str,
	},
	/// An environment variable holds a value of the wrong shape.
	#[error("Environment variable `{variable}` is invalid: {reason}.")]
	InvalidVariable {
		/// Variable name.
		variable: &'static str,
		/// What was wrong with the value.
		reason: String,
	},
}

/// Builder for [`BffConfig`] values.
#[derive(Debug)]
pub struct BffConfigBuilder {
	auth_server_url: Option<Url>,
	token_endpoint: Option<Url>,
	end_session_endpoint: Option<Url>,
	resource_server_url: Option<Url>,
	client_id: Option<String>,
	client_secret: Option<String>,
	client_url: Option<Url>,
	redirect_uri: Option<Url>,
	post_logout_redirect_uri: Option<Url>,
	cookies: CookieSettings,
	refresh_policy: RefreshPolicy,
	retry_delay: StdDuration,
	upstream_timeout: StdDuration,
	listen_addr: SocketAddr,
}
impl Default for BffConfigBuilder {
	fn default() -> Self {
		Self {
			auth_server_url: None,
			token_endpoint: None,
			end_session_endpoint: None,
			resource_server_url: None,
			client_id: None,
			client_secret: None,
			client_url: None,
			redirect_uri: None,
			post_logout_redirect_uri: None,
			cookies: CookieSettings::default(),
			refresh_policy: RefreshPolicy::default(),
			retry_delay: StdDuration::ZERO,
			upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
			listen_addr: DEFAULT_LISTEN_ADDR,
		}
	}
}
impl BffConfigBuilder {
	/// Sets the authorization server base URL; `/token` and `/logout` are derived from it.
	pub fn auth_server_url(mut self, url: Url) -> Self {
		self.auth_server_url = Some(url);

		self
	}

	/// Overrides the derived token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the derived end-session endpoint.
	pub fn end_session_endpoint(mut self, url: Url) -> Self {
		self.end_session_endpoint = Some(url);

		self
	}

	/// Sets the resource server base URL.
	pub fn resource_server_url(mut self, url: Url) -> Self {
		self.resource_server_url = Some(url);

		self
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the OAuth client secret.
	pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Sets the browser client origin.
	pub fn client_url(mut self, url: Url) -> Self {
		self.client_url = Some(url);

		self
	}

	/// Overrides the redirect URI presented during code exchange.
	pub fn redirect_uri(mut self, url: Url) -> Self {
		self.redirect_uri = Some(url);

		self
	}

	/// Overrides the post-logout redirect URI.
	pub fn post_logout_redirect_uri(mut self, url: Url) -> Self {
		self.post_logout_redirect_uri = Some(url);

		self
	}

	/// Sets the cookie domain; cookies are host-only otherwise.
	pub fn cookie_domain(mut self, domain: impl Into<String>) -> Self {
		self.cookies.domain = Some(domain.into());

		self
	}

	/// Controls the `Secure` attribute on issued cookies.
	pub fn cookie_secure(mut self, secure: bool) -> Self {
		self.cookies.secure = secure;

		self
	}

	/// Overrides which resource statuses trigger a refresh.
	pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
		self.refresh_policy = policy;

		self
	}

	/// Sets the pause between a successful refresh and the retry.
	pub fn retry_delay(mut self, delay: StdDuration) -> Self {
		self.retry_delay = delay;

		self
	}

	/// Sets the outbound request timeout.
	pub fn upstream_timeout(mut self, timeout: StdDuration) -> Self {
		self.upstream_timeout = timeout;

		self
	}

	/// Sets the listen address.
	pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
		self.listen_addr = addr;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<BffConfig, BffConfigError> {
		let auth_server = self.auth_server_url.as_ref();
		let token = explicit_or_derived(self.token_endpoint, auth_server, "token")?;
		let end_session = explicit_or_derived(self.end_session_endpoint, auth_server, "logout")?;
		let resource = self
			.resource_server_url
			.ok_or(BffConfigError::MissingSetting { setting: "resource_server_url" })?;
		let client_id = non_blank("client_id", self.client_id)?;
		let client_secret = non_blank("client_secret", self.client_secret)?;
		let client_url =
			self.client_url.ok_or(BffConfigError::MissingSetting { setting: "client_url" })?;
		let redirect_uri = match self.redirect_uri {
			Some(url) => url,
			None => join_segment(&client_url, "login/redirect", "redirect_uri")?,
		};
		let post_logout_redirect_uri =
			self.post_logout_redirect_uri.unwrap_or_else(|| client_url.clone());
		let config = BffConfig {
			endpoints: UpstreamEndpoints { token, end_session, resource },
			client: ClientRegistration {
				client_id,
				client_secret: TokenSecret::new(client_secret),
				client_url,
				redirect_uri,
				post_logout_redirect_uri,
			},
			cookies: self.cookies,
			refresh_policy: self.refresh_policy,
			retry_delay: self.retry_delay,
			upstream_timeout: self.upstream_timeout,
			listen_addr: self.listen_addr,
		};

		config.validate()?;

		Ok(config)
	}
}

impl BffConfig {
	/// Validates URL schemes across every configured endpoint and the upstream timeout.
	fn validate(&self) -> Result<(), BffConfigError> {
		if self.upstream_timeout.is_zero() {
			return Err(BffConfigError::NonPositiveDuration { setting: "upstream_timeout" });
		}

		validate_scheme("token", &self.endpoints.token)?;
		validate_scheme("end-session", &self.endpoints.end_session)?;
		validate_scheme("resource server", &self.endpoints.resource)?;
		validate_scheme("client", &self.client.client_url)?;
		validate_scheme("redirect", &self.client.redirect_uri)?;
		validate_scheme("post-logout redirect", &self.client.post_logout_redirect_uri)?;

		Ok(())
	}
}

fn explicit_or_derived(
	explicit: Option<Url>,
	base: Option<&Url>,
	segment: &'static str,
) -> Result<Url, BffConfigError> {
	match (explicit, base) {
		(Some(url), _) => Ok(url),
		(None, Some(base)) => join_segment(base, segment, segment),
		(None, None) => Err(BffConfigError::MissingSetting { setting: "auth_server_url" }),
	}
}

/// Appends `segment` to the path of `base`, keeping any path prefix the base carries.
pub(crate) fn join_segment(
	base: &Url,
	segment: &str,
	endpoint: &'static str,
) -> Result<Url, BffConfigError> {
	let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), segment);

	Url::parse(&joined).map_err(|source| BffConfigError::MalformedUrl { endpoint, source })
}

fn non_blank(setting: &'static str, value: Option<String>) -> Result<String, BffConfigError> {
	match value {
		Some(value) if !value.trim().is_empty() => Ok(value),
		Some(_) => Err(BffConfigError::BlankSetting { setting }),
		None => Err(BffConfigError::MissingSetting { setting }),
	}
}

fn validate_scheme(name: &'static str, url: &Url) -> Result<(), BffConfigError> {
	match url.scheme() {
		"http" | "https" => Ok(()),
		_ => Err(BffConfigError::UnsupportedScheme { endpoint: name, url: url.to_string() }),
	}
}
