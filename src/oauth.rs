//! Authorization server client: code exchange, refresh, and end session.
//!
//! Token grants go through the `oauth2` crate with client credentials posted in the request
//! body; the end-session call is a plain `GET` sent through the same shared transport.

pub use oauth2;

// crates.io
use ::http::{Method, Request};
use oauth2::{
	AsyncHttpClient, AuthType, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, ExtraTokenFields, HttpClientError, RedirectUrl, RefreshToken, RequestTokenError,
	StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{SessionTokens, TokenSecret},
	config::BffConfig,
	error::{ConfigError, TransientError},
	http::{
		ReqwestHttpClient, ReqwestTransportErrorMapper, ResponseMetadata, ResponseMetadataSlot,
		TransportErrorMapper, UpstreamFuture, UpstreamHttpClient, parse_retry_after,
	},
	obs::FlowKind,
};

/// Token response shape issued by OIDC providers, including the id token.
pub type SessionTokenResponse = StandardTokenResponse<SessionTokenFields, BasicTokenType>;

type SessionOAuthClient<HasTokenUrl> = Client<
	BasicErrorResponse,
	SessionTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	HasTokenUrl,
>;

/// Non-standard token response fields the relay keeps.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SessionTokenFields {
	/// OIDC id token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
	/// Refresh token lifetime in seconds; `0` marks an offline token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_expires_in: Option<u64>,
	/// Provider session identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_state: Option<String>,
}
impl ExtraTokenFields for SessionTokenFields {}
impl Debug for SessionTokenFields {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTokenFields")
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_expires_in", &self.refresh_expires_in)
			.field("session_state", &self.session_state)
			.finish()
	}
}

/// Operations the relay needs from the authorization server.
pub trait AuthorizationClient
where
	Self: 'static + Send + Sync,
{
	/// Exchanges an authorization code for a session triple.
	fn exchange_code<'a>(&'a self, code: &'a str) -> UpstreamFuture<'a, SessionTokens>;

	/// Exchanges a refresh token for a new session triple.
	///
	/// When the provider does not rotate the refresh token, the presented one is carried over.
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> UpstreamFuture<'a, SessionTokens>;

	/// Ends the provider session identified by `id_token`.
	fn end_session<'a>(&'a self, id_token: &'a TokenSecret) -> UpstreamFuture<'a, ()>;
}

/// [`AuthorizationClient`] backed by an [`UpstreamHttpClient`].
pub struct HttpAuthorizationClient<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: SessionOAuthClient<EndpointSet>,
	client_id: String,
	end_session_endpoint: Url,
	post_logout_redirect_uri: Url,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> HttpAuthorizationClient<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a client from validated configuration and the shared transport.
	pub fn from_config(
		config: &BffConfig,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		let client = &config.client;
		let oauth_client = SessionOAuthClient::<EndpointNotSet>::new(ClientId::new(
			client.client_id.clone(),
		))
		.set_client_secret(ClientSecret::new(client.client_secret.expose().to_owned()))
		.set_auth_type(AuthType::RequestBody)
		.set_redirect_uri(RedirectUrl::from_url(client.redirect_uri.clone()))
		.set_token_uri(TokenUrl::from_url(config.endpoints.token.clone()));

		Self {
			oauth_client,
			client_id: client.client_id.clone(),
			end_session_endpoint: config.endpoints.end_session.clone(),
			post_logout_redirect_uri: client.post_logout_redirect_uri.clone(),
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		}
	}

	/// Builds the end-session URL carrying the id token hint.
	fn end_session_url(&self, id_token: &TokenSecret) -> Url {
		let mut url = self.end_session_endpoint.clone();

		url.query_pairs_mut()
			.append_pair("post_logout_redirect_uri", self.post_logout_redirect_uri.as_str())
			.append_pair("id_token_hint", id_token.expose())
			.append_pair("client_id", &self.client_id);

		url
	}
}
impl<C, M> AuthorizationClient for HttpAuthorizationClient<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_code<'a>(&'a self, code: &'a str) -> UpstreamFuture<'a, SessionTokens> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						FlowKind::CodeExchange,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;

			session_tokens(response, None)
		})
	}

	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> UpstreamFuture<'a, SessionTokens> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(FlowKind::Refresh, meta.take(), err, self.error_mapper.as_ref())
				})?;

			session_tokens(response, Some(refresh_token))
		})
	}

	fn end_session<'a>(&'a self, id_token: &'a TokenSecret) -> UpstreamFuture<'a, ()> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let request = Request::builder()
				.method(Method::GET)
				.uri(self.end_session_url(id_token).as_str())
				.body(Vec::new())
				.map_err(ConfigError::from)?;
			let response = instrumented.call(request).await.map_err(|err| {
				self.error_mapper.map_transport_error(
					FlowKind::EndSession,
					meta.take().as_ref(),
					err,
				)
			})?;
			let status = response.status();

			if status.is_success() || status.is_redirection() {
				return Ok(());
			}
			if is_rejection(status.as_u16()) {
				return Err(Error::UpstreamAuth {
					flow: FlowKind::EndSession,
					status: Some(status.as_u16()),
					reason: format!("end-session endpoint answered {status}"),
				});
			}

			Err(TransientError::UnexpectedStatus {
				flow: FlowKind::EndSession,
				status: Some(status.as_u16()),
				retry_after: parse_retry_after(response.headers()),
			}
			.into())
		})
	}
}

/// Client errors other than throttling mean the provider refused the request outright.
fn is_rejection(status: u16) -> bool {
	(400..500).contains(&status) && status != 429
}

fn session_tokens(
	response: SessionTokenResponse,
	presented_refresh: Option<&TokenSecret>,
) -> Result<SessionTokens> {
	let extra = response.extra_fields();
	let mut builder = SessionTokens::builder()
		.access_token(response.access_token().secret().to_owned())
		.token_type(response.token_type().as_ref());

	if let Some(expires_in) = response.expires_in().and_then(|d| Duration::try_from(d).ok()) {
		builder = builder.expires_in(expires_in);
	}
	if let Some(refresh) = response.refresh_token() {
		builder = builder.refresh_token(refresh.secret().to_owned());
	}
	if let Some(presented) = presented_refresh {
		builder = builder.refresh_token_or(presented);
	}
	if let Some(id_token) = extra.id_token.as_deref().filter(|v| !v.trim().is_empty()) {
		builder = builder.id_token(id_token);
	}
	if let Some(secs) = extra.refresh_expires_in.and_then(|secs| i64::try_from(secs).ok()) {
		builder = builder.refresh_expires_in(Duration::seconds(secs));
	}
	if let Some(scopes) = response.scopes() {
		builder = builder
			.scope(scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" "));
	}
	if let Some(session_state) = &extra.session_state {
		builder = builder.session_state(session_state.as_str());
	}

	builder.build().map_err(|e| TransientError::from(e).into())
}

fn map_request_error<E, M>(
	flow: FlowKind,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();
	let status = meta_status(meta_ref);
	let rejected = status.is_none_or(is_rejection);

	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = match response.error_description() {
				Some(description) => format!("{}: {description}", response.error().as_ref()),
				None => response.error().as_ref().to_owned(),
			};

			if rejected {
				Error::UpstreamAuth { flow, status, reason }
			} else {
				TransientError::TokenEndpoint {
					message: reason,
					status,
					retry_after: meta_retry_after(meta_ref),
				}
				.into()
			}
		},
		RequestTokenError::Request(error) => mapper.map_transport_error(flow, meta_ref, error),
		RequestTokenError::Parse(error, _body) =>
			if status.is_some() && rejected {
				Error::UpstreamAuth { flow, status, reason: "unreadable error response".into() }
			} else {
				TransientError::TokenResponseParse { source: error, status }.into()
			},
		RequestTokenError::Other(message) =>
			if status.is_some() && rejected {
				Error::UpstreamAuth { flow, status, reason: message }
			} else {
				TransientError::TokenEndpoint {
					message,
					status,
					retry_after: meta_retry_after(meta_ref),
				}
				.into()
			},
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(json: &str) -> SessionTokenResponse {
		serde_json::from_str(json).expect("Token response fixture should deserialize.")
	}

	#[test]
	fn token_response_keeps_oidc_fields() {
		let tokens = session_tokens(
			response(
				r#"{
					"access_token": "at",
					"token_type": "Bearer",
					"expires_in": 300,
					"refresh_token": "rt",
					"refresh_expires_in": 1800,
					"id_token": "it",
					"session_state": "abc",
					"scope": "openid profile",
					"not-before-policy": 0
				}"#,
			),
			None,
		)
		.expect("Complete responses should map.");

		assert_eq!(tokens.access_token.expose(), "at");
		assert_eq!(tokens.refresh_token.expose(), "rt");
		assert_eq!(tokens.id_token.expose(), "it");
		assert_eq!(tokens.expires_in, Duration::seconds(300));
		assert_eq!(tokens.refresh_expires_in, Some(Duration::seconds(1800)));
		assert_eq!(tokens.scope.as_deref(), Some("openid profile"));
		assert_eq!(tokens.session_state.as_deref(), Some("abc"));
	}

	#[test]
	fn refresh_without_rotation_keeps_presented_token() {
		let presented = TokenSecret::new("presented");
		let tokens = session_tokens(
			response(
				r#"{"access_token":"at2","token_type":"bearer","expires_in":60,"id_token":"it2"}"#,
			),
			Some(&presented),
		)
		.expect("Refresh responses may omit the refresh token.");

		assert_eq!(tokens.refresh_token.expose(), "presented");
		assert_eq!(tokens.refresh_expires_in, None);
	}

	#[test]
	fn missing_id_token_is_incomplete() {
		let err = session_tokens(
			response(r#"{"access_token":"at","token_type":"bearer","expires_in":60,"refresh_token":"rt"}"#),
			None,
		)
		.expect_err("Responses without an id token must be rejected.");

		assert!(matches!(err, Error::Transient(TransientError::IncompleteTokenResponse(_))));
	}

	#[test]
	fn throttling_is_not_a_rejection() {
		assert!(is_rejection(400));
		assert!(is_rejection(401));
		assert!(!is_rejection(429));
		assert!(!is_rejection(503));
	}

	#[test]
	fn fields_debug_redacts_id_token() {
		let fields = SessionTokenFields { id_token: Some("secret-id".into()), ..Default::default() };

		assert!(!format!("{fields:?}").contains("secret-id"));
	}
}
