//! Cookie codec for the `AT`/`RT`/`IT` session triple.
//!
//! [`CookieCodec::encode`] and [`CookieCodec::clear`] always return a [`SessionCookies`] value
//! holding all three cookies, so a response can never update the triple partially.

// crates.io
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
// self
use crate::{
	_prelude::*,
	auth::{SessionTokens, TokenSecret},
};

/// Cookie key carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "AT";
/// Cookie key carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "RT";
/// Cookie key carrying the id token.
pub const ID_TOKEN_COOKIE: &str = "IT";

/// Keys of the session triple, in the order they are written.
pub const SESSION_COOKIE_KEYS: [&str; 3] = [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, ID_TOKEN_COOKIE];

/// Static cookie attributes applied to every session cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieSettings {
	/// Domain attribute; host-only cookies are issued when unset.
	pub domain: Option<String>,
	/// Whether issued cookies carry the `Secure` attribute.
	pub secure: bool,
}
impl Default for CookieSettings {
	fn default() -> Self {
		Self { domain: None, secure: true }
	}
}

/// Encodes session tokens into browser cookies and produces the clearing triple.
#[derive(Clone, Debug, Default)]
pub struct CookieCodec {
	settings: CookieSettings,
}
impl CookieCodec {
	/// Creates a codec for the provided attributes.
	pub fn new(settings: CookieSettings) -> Self {
		Self { settings }
	}

	/// Returns the attributes applied by this codec.
	pub fn settings(&self) -> &CookieSettings {
		&self.settings
	}

	/// Encodes the triple; `AT` and `IT` share the access token lifetime.
	///
	/// An unbounded refresh token becomes a browser-session cookie (no `Max-Age`) so it can
	/// never be mistaken for a deletion.
	pub fn encode(&self, tokens: &SessionTokens) -> SessionCookies {
		let access = self.session_cookie(
			ACCESS_TOKEN_COOKIE,
			tokens.access_token.expose(),
			Some(tokens.expires_in),
		);
		let refresh = self.session_cookie(
			REFRESH_TOKEN_COOKIE,
			tokens.refresh_token.expose(),
			tokens.refresh_expires_in,
		);
		let id = self.session_cookie(ID_TOKEN_COOKIE, tokens.id_token.expose(), Some(tokens.expires_in));

		SessionCookies([access, refresh, id])
	}

	/// Produces the deletion triple: empty values, `Max-Age=0`, always `Secure`.
	pub fn clear(&self) -> SessionCookies {
		SessionCookies(SESSION_COOKIE_KEYS.map(|name| self.removal_cookie(name)))
	}

	/// Reads the inbound triple; blank cookie values count as absent.
	pub fn read(&self, jar: &CookieJar) -> InboundSession {
		let get = |name| jar.get(name).and_then(|cookie| TokenSecret::non_blank(cookie.value()));

		InboundSession {
			access_token: get(ACCESS_TOKEN_COOKIE),
			refresh_token: get(REFRESH_TOKEN_COOKIE),
			id_token: get(ID_TOKEN_COOKIE),
		}
	}

	fn session_cookie(
		&self,
		name: &'static str,
		value: &str,
		max_age: Option<Duration>,
	) -> Cookie<'static> {
		let mut builder = Cookie::build((name, value.to_owned()))
			.http_only(true)
			.secure(self.settings.secure)
			.same_site(SameSite::None)
			.path("/");

		if let Some(domain) = &self.settings.domain {
			builder = builder.domain(domain.clone());
		}
		if let Some(max_age) = max_age {
			builder = builder.max_age(max_age);
		}

		builder.build()
	}

	fn removal_cookie(&self, name: &'static str) -> Cookie<'static> {
		let mut builder = Cookie::build((name, ""))
			.http_only(true)
			.secure(true)
			.same_site(SameSite::None)
			.path("/")
			.max_age(Duration::ZERO);

		if let Some(domain) = &self.settings.domain {
			builder = builder.domain(domain.clone());
		}

		builder.build()
	}
}

/// Session credentials presented by the browser.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InboundSession {
	/// `AT` cookie value.
	pub access_token: Option<TokenSecret>,
	/// `RT` cookie value.
	pub refresh_token: Option<TokenSecret>,
	/// `IT` cookie value.
	pub id_token: Option<TokenSecret>,
}

/// The `AT`/`RT`/`IT` triple attached to a response.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionCookies([Cookie<'static>; 3]);
impl SessionCookies {
	/// Iterates over the three cookies in `AT`, `RT`, `IT` order.
	pub fn iter(&self) -> impl Iterator<Item = &Cookie<'static>> {
		self.0.iter()
	}

	/// Returns the cookie stored under `name`, if it is one of the session keys.
	pub fn get(&self, name: &str) -> Option<&Cookie<'static>> {
		self.0.iter().find(|cookie| cookie.name() == name)
	}

	/// Returns `true` when every cookie in the triple instructs the browser to delete it.
	pub fn is_clear(&self) -> bool {
		self.0.iter().all(is_deletion)
	}

	/// Renders `Set-Cookie` header values in `AT`, `RT`, `IT` order.
	pub fn header_values(&self) -> Vec<String> {
		self.0.iter().map(ToString::to_string).collect()
	}
}

/// Returns `true` if the cookie carries a non-positive `Max-Age`.
pub fn is_deletion(cookie: &Cookie<'_>) -> bool {
	cookie.max_age().is_some_and(|max_age| !max_age.is_positive())
}
