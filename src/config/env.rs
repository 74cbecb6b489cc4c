// std
use std::{net::SocketAddr, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	config::{BffConfig, BffConfigBuilder, BffConfigError},
	relay::RefreshPolicy,
};

impl BffConfig {
	/// Loads configuration from `BFF_*` environment variables.
	///
	/// # Required env vars
	/// - `BFF_AUTH_SERVER_URL`: authorization server base URL
	/// - `BFF_RESOURCE_SERVER_URL`: resource server base URL
	/// - `BFF_CLIENT_ID`, `BFF_CLIENT_SECRET`: client registration
	/// - `BFF_CLIENT_URL`: browser client origin
	///
	/// # Optional env vars
	/// - `BFF_TOKEN_ENDPOINT`, `BFF_END_SESSION_ENDPOINT`: endpoint overrides
	/// - `BFF_REDIRECT_URI`, `BFF_POST_LOGOUT_REDIRECT_URI`: redirect overrides
	/// - `BFF_COOKIE_DOMAIN`, `BFF_COOKIE_SECURE`: cookie attributes
	/// - `BFF_REFRESH_ON_FORBIDDEN`: also refresh on `403`
	/// - `BFF_RETRY_DELAY_MS`, `BFF_UPSTREAM_TIMEOUT_SECS`, `BFF_LISTEN_ADDR`: tuning
	pub fn from_env() -> Result<Self, BffConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads configuration through an arbitrary variable lookup; blank values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, BffConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let vars = EnvVars { lookup };
		let mut builder = BffConfigBuilder::default()
			.auth_server_url(vars.required_url("BFF_AUTH_SERVER_URL")?)
			.resource_server_url(vars.required_url("BFF_RESOURCE_SERVER_URL")?)
			.client_id(vars.required("BFF_CLIENT_ID")?)
			.client_secret(vars.required("BFF_CLIENT_SECRET")?)
			.client_url(vars.required_url("BFF_CLIENT_URL")?);

		if let Some(url) = vars.url("BFF_TOKEN_ENDPOINT")? {
			builder = builder.token_endpoint(url);
		}
		if let Some(url) = vars.url("BFF_END_SESSION_ENDPOINT")? {
			builder = builder.end_session_endpoint(url);
		}
		if let Some(url) = vars.url("BFF_REDIRECT_URI")? {
			builder = builder.redirect_uri(url);
		}
		if let Some(url) = vars.url("BFF_POST_LOGOUT_REDIRECT_URI")? {
			builder = builder.post_logout_redirect_uri(url);
		}
		if let Some(domain) = vars.optional("BFF_COOKIE_DOMAIN") {
			builder = builder.cookie_domain(domain);
		}
		if let Some(secure) = vars.parsed::<bool>("BFF_COOKIE_SECURE")? {
			builder = builder.cookie_secure(secure);
		}
		if let Some(true) = vars.parsed::<bool>("BFF_REFRESH_ON_FORBIDDEN")? {
			builder = builder.refresh_policy(RefreshPolicy::UnauthorizedOrForbidden);
		}
		if let Some(ms) = vars.parsed::<u64>("BFF_RETRY_DELAY_MS")? {
			builder = builder.retry_delay(StdDuration::from_millis(ms));
		}
		if let Some(secs) = vars.parsed::<u64>("BFF_UPSTREAM_TIMEOUT_SECS")? {
			builder = builder.upstream_timeout(StdDuration::from_secs(secs));
		}
		if let Some(addr) = vars.parsed::<SocketAddr>("BFF_LISTEN_ADDR")? {
			builder = builder.listen_addr(addr);
		}

		builder.build()
	}
}

struct EnvVars<F> {
	lookup: F,
}
impl<F> EnvVars<F>
where
	F: Fn(&str) -> Option<String>,
{
	fn optional(&self, variable: &'static str) -> Option<String> {
		(self.lookup)(variable).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
	}

	fn required(&self, variable: &'static str) -> Result<String, BffConfigError> {
		self.optional(variable).ok_or(BffConfigError::MissingVariable { variable })
	}

	fn url(&self, variable: &'static str) -> Result<Option<Url>, BffConfigError> {
		self.optional(variable)
			.map(|value| {
				Url::parse(&value).map_err(|e| BffConfigError::InvalidVariable {
					variable,
					reason: e.to_string(),
				})
			})
			.transpose()
	}

	fn required_url(&self, variable: &'static str) -> Result<Url, BffConfigError> {
		self.url(variable)?.ok_or(BffConfigError::MissingVariable { variable })
	}

	fn parsed<T>(&self, variable: &'static str) -> Result<Option<T>, BffConfigError>
	where
		T: std::str::FromStr,
		T::Err: Display,
	{
		self.optional(variable)
			.map(|value| {
				value.to_ascii_lowercase().parse::<T>().map_err(|e| BffConfigError::InvalidVariable {
					variable,
					reason: e.to_string(),
				})
			})
			.transpose()
	}
}
