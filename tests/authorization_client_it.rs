mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use bff_relay::oauth::HttpAuthorizationClient;
use common::*;

fn build_client(server: &MockServer) -> HttpAuthorizationClient {
	let config = build_config(&mock_base(server), "http://localhost:8901");

	HttpAuthorizationClient::from_config(&config, build_http_client(), ReqwestTransportErrorMapper)
}

#[tokio::test]
async fn mock_upstreams_are_served_over_plain_http() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_request\"}");
		})
		.await;
	let base = mock_base(&server);

	assert!(base.starts_with("http://"), "Unexpected mock base: {base}.");

	let err = build_client(&server)
		.exchange_code("code-plain")
		.await
		.expect_err("A 400 token reply should fail.");

	mock.assert_async().await;

	assert!(
		matches!(err, Error::UpstreamAuth { status: Some(400), .. }),
		"Unexpected error: {err:?}."
	);
}

#[tokio::test]
async fn exchange_code_posts_client_credentials_in_the_body() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "code-123")
				.form_urlencoded_tuple("client_id", CLIENT_ID)
				.form_urlencoded_tuple("client_secret", CLIENT_SECRET)
				.form_urlencoded_tuple("redirect_uri", "http://localhost:4200/login/redirect");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "access-1",
				"refresh_token": "refresh-1",
				"id_token": "id-1",
				"token_type": "Bearer",
				"expires_in": 300,
				"refresh_expires_in": 1800,
				"session_state": "state-1",
				"scope": "openid profile"
			}));
		})
		.await;
	let tokens = build_client(&server)
		.exchange_code("code-123")
		.await
		.expect("Authorization code exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(tokens.access_token.expose(), "access-1");
	assert_eq!(tokens.refresh_token.expose(), "refresh-1");
	assert_eq!(tokens.id_token.expose(), "id-1");
	assert_eq!(tokens.expires_in, Duration::seconds(300));
	assert_eq!(tokens.refresh_expires_in, Some(Duration::seconds(1800)));
	assert_eq!(tokens.session_state.as_deref(), Some("state-1"));
	assert_eq!(tokens.scope.as_deref(), Some("openid profile"));
}

#[tokio::test]
async fn refresh_without_rotation_keeps_the_presented_refresh_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-old");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "access-2",
				"id_token": "id-2",
				"token_type": "Bearer",
				"expires_in": 120,
				"refresh_expires_in": 0
			}));
		})
		.await;
	let tokens = build_client(&server)
		.refresh(&TokenSecret::new("refresh-old"))
		.await
		.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(tokens.access_token.expose(), "access-2");
	assert_eq!(tokens.refresh_token.expose(), "refresh-old");
	assert_eq!(tokens.refresh_expires_in, None, "Offline tokens carry no lifetime.");
}

#[tokio::test]
async fn invalid_grant_is_an_upstream_rejection() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Token is not active\"}");
		})
		.await;
	let err = build_client(&server)
		.refresh(&TokenSecret::new("refresh-revoked"))
		.await
		.expect_err("Revoked refresh tokens should be rejected.");

	mock.assert_async().await;

	match err {
		Error::UpstreamAuth { flow, status, reason } => {
			assert_eq!(flow, FlowKind::Refresh);
			assert_eq!(status, Some(400));
			assert!(reason.contains("invalid_grant"));
		},
		other => panic!("Expected an upstream rejection, got {other:?}."),
	}
}

#[tokio::test]
async fn server_errors_are_transient_and_keep_retry_after() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503)
				.header("content-type", "application/json")
				.header("retry-after", "7")
				.body("{\"error\":\"temporarily_unavailable\"}");
		})
		.await;
	let err = build_client(&server)
		.exchange_code("code-503")
		.await
		.expect_err("Unavailable token endpoints should fail.");

	mock.assert_async().await;

	assert!(matches!(err, Error::Transient(_)), "Unexpected error: {err:?}.");
	assert_eq!(err.upstream_status(), Some(503));
	assert_eq!(err.retry_after(), Some(Duration::seconds(7)));
}

#[tokio::test]
async fn response_without_id_token_is_incomplete() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "access-3",
				"refresh_token": "refresh-3",
				"token_type": "Bearer",
				"expires_in": 60
			}));
		})
		.await;
	let err = build_client(&server)
		.exchange_code("code-no-id")
		.await
		.expect_err("Responses without an id token should be rejected.");

	assert!(matches!(err, Error::Transient(TransientError::IncompleteTokenResponse(_))));
}

#[tokio::test]
async fn end_session_sends_the_id_token_hint() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/logout")
				.query_param("id_token_hint", "id-9")
				.query_param("client_id", CLIENT_ID)
				.query_param("post_logout_redirect_uri", "http://localhost:4200/");
			then.status(302).header("location", "http://localhost:4200/");
		})
		.await;

	build_client(&server)
		.end_session(&TokenSecret::new("id-9"))
		.await
		.expect("Redirecting end-session replies should count as success.");

	mock.assert_async().await;
}

#[tokio::test]
async fn end_session_failures_are_classified_by_status() {
	let server = MockServer::start_async().await;
	let _rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/logout").query_param("id_token_hint", "id-stale");
			then.status(400);
		})
		.await;
	let _broken = server
		.mock_async(|when, then| {
			when.method(GET).path("/logout").query_param("id_token_hint", "id-any");
			then.status(500);
		})
		.await;
	let client = build_client(&server);
	let rejected = client
		.end_session(&TokenSecret::new("id-stale"))
		.await
		.expect_err("A 400 end-session reply should fail.");

	assert!(matches!(rejected, Error::UpstreamAuth { status: Some(400), .. }));

	let broken = client
		.end_session(&TokenSecret::new("id-any"))
		.await
		.expect_err("A 500 end-session reply should fail.");

	assert!(matches!(
		broken,
		Error::Transient(TransientError::UnexpectedStatus { status: Some(500), .. })
	));
}

#[tokio::test]
async fn unreachable_authorization_server_is_a_transport_error() {
	let config = build_config(&unreachable_base(), "http://localhost:8901");
	let client: HttpAuthorizationClient =
		HttpAuthorizationClient::from_config(&config, build_http_client(), ReqwestTransportErrorMapper);
	let err = client
		.refresh(&TokenSecret::new("refresh-1"))
		.await
		.expect_err("Closed ports should not yield tokens.");

	assert!(matches!(err, Error::UpstreamUnreachable(_)), "Unexpected error: {err:?}.");

	let err = client
		.end_session(&TokenSecret::new("id-1"))
		.await
		.expect_err("Closed ports should not confirm logouts.");

	assert!(matches!(err, Error::UpstreamUnreachable(_)), "Unexpected error: {err:?}.");
}
