//! Resource server client: one bearer-authenticated call per invocation, no retries.
//!
//! Every upstream status, `401` and `403` included, comes back as a [`ResourceResponse`] value;
//! only transport failures surface as errors.

// crates.io
use ::http::{
	HeaderValue, Method, Request, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use oauth2::AsyncHttpClient;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::BffConfig,
	error::ConfigError,
	http::{
		ReqwestHttpClient, ReqwestTransportErrorMapper, ResponseMetadataSlot, TransportErrorMapper,
		UpstreamFuture, UpstreamHttpClient,
	},
	obs::FlowKind,
};

/// Resource server routes the relay forwards to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceRoute {
	/// `/user/data`.
	UserData,
	/// `/admin/data`.
	AdminData,
}
impl ResourceRoute {
	/// Every route, in declaration order.
	pub const ALL: [Self; 2] = [Self::UserData, Self::AdminData];

	/// Path appended to the resource server base URL.
	pub const fn path(self) -> &'static str {
		match self {
			Self::UserData => "/user/data",
			Self::AdminData => "/admin/data",
		}
	}
}
impl Display for ResourceRoute {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(self.path())
	}
}

/// Opaque body plus its media type, relayed byte for byte in either direction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload {
	/// `Content-Type` header value, when one was supplied.
	pub content_type: Option<HeaderValue>,
	/// Raw body bytes.
	pub body: Bytes,
}
impl Payload {
	/// Wraps a body with an optional content type.
	pub fn new(content_type: Option<HeaderValue>, body: impl Into<Bytes>) -> Self {
		Self { content_type, body: body.into() }
	}
}

/// Resource server reply as received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceResponse {
	/// Upstream status code.
	pub status: StatusCode,
	/// Upstream body and media type.
	pub payload: Payload,
}

/// Forwards one bearer-authenticated call to the resource server.
pub trait ResourceClient
where
	Self: 'static + Send + Sync,
{
	/// Sends `payload` to `route` with `access_token` as the bearer credential.
	fn call<'a>(
		&'a self,
		route: ResourceRoute,
		access_token: &'a TokenSecret,
		payload: &'a Payload,
	) -> UpstreamFuture<'a, ResourceResponse>;
}

/// [`ResourceClient`] backed by an [`UpstreamHttpClient`].
pub struct HttpResourceClient<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	user_data: Url,
	admin_data: Url,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> HttpResourceClient<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a client for the configured resource server, resolving every route up front.
	pub fn from_config(
		config: &BffConfig,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError> {
		let base = &config.endpoints.resource;

		Ok(Self {
			user_data: route_url(base, ResourceRoute::UserData)?,
			admin_data: route_url(base, ResourceRoute::AdminData)?,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}

	/// Resolved upstream URL for `route`.
	pub fn url(&self, route: ResourceRoute) -> &Url {
		match route {
			ResourceRoute::UserData => &self.user_data,
			ResourceRoute::AdminData => &self.admin_data,
		}
	}
}
impl<C, M> ResourceClient for HttpResourceClient<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn call<'a>(
		&'a self,
		route: ResourceRoute,
		access_token: &'a TokenSecret,
		payload: &'a Payload,
	) -> UpstreamFuture<'a, ResourceResponse> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut request = Request::builder()
				.method(Method::POST)
				.uri(self.url(route).as_str())
				.header(AUTHORIZATION, format!("Bearer {}", access_token.expose()));

			if let Some(content_type) = &payload.content_type {
				request = request.header(CONTENT_TYPE, content_type.clone());
			}

			let request = request.body(payload.body.to_vec()).map_err(ConfigError::from)?;
			let response = instrumented.call(request).await.map_err(|err| {
				self.error_mapper.map_transport_error(FlowKind::Resource, meta.take().as_ref(), err)
			})?;
			let status = response.status();
			let content_type = response.headers().get(CONTENT_TYPE).cloned();

			tracing::debug!(%route, status = status.as_u16(), "Resource server replied.");

			Ok(ResourceResponse {
				status,
				payload: Payload::new(content_type, response.into_body()),
			})
		})
	}
}

fn route_url(base: &Url, route: ResourceRoute) -> Result<Url, ConfigError> {
	let joined = format!("{}{}", base.as_str().trim_end_matches('/'), route.path());

	Url::parse(&joined).map_err(|source| ConfigError::InvalidEndpoint { endpoint: "resource", source })
}
