mod common;

// crates.io
use httpmock::prelude::*;
// self
use bff_relay::resource::HttpResourceClient;
use common::*;

fn build_client(resource_base: &str) -> HttpResourceClient {
	let config = build_config("http://localhost:8180/realms/demo", resource_base);

	HttpResourceClient::from_config(&config, build_http_client(), ReqwestTransportErrorMapper)
		.expect("Resource client should build from a valid configuration.")
}

#[tokio::test]
async fn call_forwards_bearer_token_and_body() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/user/data")
				.header("authorization", "Bearer access-1")
				.header("content-type", "application/json")
				.body("{\"page\":2}");
			then.status(200).header("content-type", "application/json").body("{\"items\":[]}");
		})
		.await;
	let client = build_client(&format!("{}/api", mock_base(&server)));
	let payload = Payload::new(Some(HeaderValue::from_static("application/json")), "{\"page\":2}");
	let response = client
		.call(ResourceRoute::UserData, &TokenSecret::new("access-1"), &payload)
		.await
		.expect("Resource call should succeed.");

	mock.assert_async().await;

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(response.payload.body.as_ref(), b"{\"items\":[]}");
	assert_eq!(
		response.payload.content_type,
		Some(HeaderValue::from_static("application/json"))
	);
}

#[tokio::test]
async fn upstream_statuses_are_values_not_errors() {
	let server = MockServer::start_async().await;
	let _unauthorized = server
		.mock_async(|when, then| {
			when.method(POST).path("/admin/data").header("authorization", "Bearer expired");
			then.status(401);
		})
		.await;
	let _teapot = server
		.mock_async(|when, then| {
			when.method(POST).path("/admin/data").header("authorization", "Bearer brewing");
			then.status(418).header("content-type", "text/plain").body("short and stout");
		})
		.await;
	let client = build_client(&mock_base(&server));
	let unauthorized = client
		.call(ResourceRoute::AdminData, &TokenSecret::new("expired"), &Payload::default())
		.await
		.expect("A 401 reply should be returned as a response.");

	assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);
	assert!(unauthorized.payload.body.is_empty());

	let teapot = client
		.call(ResourceRoute::AdminData, &TokenSecret::new("brewing"), &Payload::default())
		.await
		.expect("A 418 reply should be returned as a response.");

	assert_eq!(teapot.status, StatusCode::IM_A_TEAPOT);
	assert_eq!(teapot.payload.body.as_ref(), b"short and stout");
	assert_eq!(teapot.payload.content_type, Some(HeaderValue::from_static("text/plain")));
}

#[tokio::test]
async fn slow_resource_server_times_out() {
	let server = MockServer::start_async().await;
	let _slow = server
		.mock_async(|when, then| {
			when.method(POST).path("/user/data");
			then.status(200).delay(StdDuration::from_millis(1_500));
		})
		.await;
	let config = build_config("http://localhost:8180/realms/demo", &mock_base(&server));
	let http_client = ReqwestHttpClient::with_timeout(StdDuration::from_millis(200))
		.expect("Short-timeout HTTP client should build.");
	let client: HttpResourceClient =
		HttpResourceClient::from_config(&config, http_client, ReqwestTransportErrorMapper)
			.expect("Resource client should build from a valid configuration.");
	let err = client
		.call(ResourceRoute::UserData, &TokenSecret::new("access"), &Payload::default())
		.await
		.expect_err("Slow upstreams should time out.");

	assert!(
		matches!(err, Error::UpstreamUnreachable(TransportError::Timeout { flow: FlowKind::Resource })),
		"Unexpected error: {err:?}."
	);
}

#[tokio::test]
async fn unreachable_resource_server_is_a_transport_error() {
	let client = build_client(&unreachable_base());
	let err = client
		.call(ResourceRoute::UserData, &TokenSecret::new("access"), &Payload::default())
		.await
		.expect_err("Closed ports should not produce a response.");

	assert!(matches!(err, Error::UpstreamUnreachable(_)), "Unexpected error: {err:?}.");
}
