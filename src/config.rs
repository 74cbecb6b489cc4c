//! Static relay configuration: upstream endpoints, client registration, cookie attributes, and
//! relay tuning.
//!
//! Values are assembled through [`BffConfigBuilder`], which validates them once at start-up;
//! [`BffConfig::from_env`] feeds the builder from `BFF_*` environment variables.

/// Builder API for assembling validated configurations.
pub mod builder;
/// Environment variable loader.
pub mod env;

pub use builder::*;
pub use env::*;

// std
use std::{
	net::{IpAddr, Ipv4Addr, SocketAddr},
	time::Duration as StdDuration,
};
// self
use crate::{_prelude::*, auth::TokenSecret, cookie::CookieSettings, relay::RefreshPolicy};

/// Listen address used when none is configured.
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
	SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8902);
/// Outbound request timeout used when none is configured.
pub const DEFAULT_UPSTREAM_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Endpoints of the two upstreams the relay talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamEndpoints {
	/// Authorization server token endpoint.
	pub token: Url,
	/// Authorization server end-session endpoint.
	pub end_session: Url,
	/// Resource server base URL; relay routes are appended to its path.
	pub resource: Url,
}

/// Client registration shared with the authorization server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientRegistration {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret, sent in the token request body.
	pub client_secret: TokenSecret,
	/// Browser client origin.
	pub client_url: Url,
	/// Redirect URI presented during the authorization code exchange.
	pub redirect_uri: Url,
	/// Where the authorization server sends the browser after ending the session.
	pub post_logout_redirect_uri: Url,
}

/// Validated relay configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BffConfig {
	/// Upstream endpoints.
	pub endpoints: UpstreamEndpoints,
	/// Client registration.
	pub client: ClientRegistration,
	/// Attributes applied to session cookies.
	pub cookies: CookieSettings,
	/// Resource statuses that trigger a refresh.
	pub refresh_policy: RefreshPolicy,
	/// Pause between a successful refresh and the retried resource call.
	pub retry_delay: StdDuration,
	/// Timeout applied to every outbound request.
	pub upstream_timeout: StdDuration,
	/// Socket address the HTTP surface binds to.
	pub listen_addr: SocketAddr,
}
impl BffConfig {
	/// Creates a new builder.
	pub fn builder() -> BffConfigBuilder {
		BffConfigBuilder::default()
	}

	/// Browser origin allowed by CORS, without a trailing slash.
	pub fn client_origin(&self) -> String {
		self.client.client_url.origin().ascii_serialization()
	}
}
