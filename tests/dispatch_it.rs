#![cfg(feature = "reqwest")]

mod common;

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use httpmock::prelude::*;
// self
use common::{descriptor, seeded_store};
use session_broker::{
	auth::TokenSecret,
	error::{Error, RefreshRejected, RejectionKind},
	flows::ReqwestSessionClient,
	http::RequestDescriptor,
	http_types::StatusCode,
	store::CredentialStore,
};

const PROJECTS: &str = "/api/projects/";
const REFRESH: &str = "/api/token/refresh/";

fn client(server: &MockServer, store: Arc<CredentialStore>) -> ReqwestSessionClient {
	ReqwestSessionClient::new(descriptor(&server.base_url()), store)
}

async fn mock_projects(server: &MockServer) {
	server
		.mock_async(|when, then| {
			when.method(GET).path(PROJECTS).header("authorization", "Bearer A1");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"detail\":\"Given token not valid for any token type\",\"code\":\"token_not_valid\"}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path(PROJECTS).header("authorization", "Bearer A2");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rejections_trigger_one_refresh() {
	let server = MockServer::start_async().await;
	let store = seeded_store("A1", "R1").await;
	let client = client(&server, store.clone());

	mock_projects(&server).await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH).body("{\"refresh\":\"R1\"}");
			then.status(200)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(250))
				.body("{\"access\":\"A2\",\"refresh\":\"R2\"}");
		})
		.await;
	let mut handles = Vec::new();

	for _ in 0..5 {
		let client = client.clone();

		handles.push(tokio::spawn(async move {
			client.send(RequestDescriptor::get("projects/")).await
		}));
	}

	for handle in handles {
		let response = handle
			.await
			.expect("Request task should not panic.")
			.expect("Every request should succeed after the refresh.");

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(response.text(), "[]");
	}

	refresh.assert_calls_async(1).await;

	let stored = store.get().expect("Store should hold the refreshed credential.");

	assert_eq!(stored.access_token, TokenSecret::new("A2"));
	assert_eq!(stored.refresh_token, TokenSecret::new("R2"));
	assert_eq!(client.coordinator.metrics().attempts(), 1);
}

#[tokio::test]
async fn accepted_request_never_refreshes() {
	let server = MockServer::start_async().await;
	let store = seeded_store("A2", "R2").await;
	let client = client(&server, store);

	mock_projects(&server).await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH);
			then.status(500);
		})
		.await;
	let mut request = RequestDescriptor::get("/projects/");
	let response = client.send_tracked(&mut request).await.expect("Request should succeed.");

	assert_eq!(response.status, StatusCode::OK);
	assert!(!request.is_retried());

	refresh.assert_calls_async(0).await;
}

#[tokio::test]
async fn replayed_request_is_not_replayed_again() {
	let server = MockServer::start_async().await;
	let store = seeded_store("A1", "R1").await;
	let client = client(&server, store);
	let projects = server
		.mock_async(|when, then| {
			when.method(GET).path(PROJECTS);
			then.status(401).body("{\"detail\":\"Authentication credentials were not provided.\"}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access\":\"A2\"}");
		})
		.await;
	let mut request = RequestDescriptor::get("projects/");
	let response = client
		.send_tracked(&mut request)
		.await
		.expect("A rejected replay is returned as a response.");

	assert_eq!(response.status, StatusCode::UNAUTHORIZED);
	assert!(request.is_retried());

	projects.assert_calls_async(2).await;
	refresh.assert_calls_async(1).await;

	let stored = client.credential().expect("Refreshed credential should be stored.");

	assert_eq!(stored.access_token, TokenSecret::new("A2"));
	assert_eq!(stored.refresh_token, TokenSecret::new("R1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn refused_refresh_expires_every_waiting_request() {
	let server = MockServer::start_async().await;
	let store = seeded_store("A1", "R1").await;
	let signals = Arc::new(AtomicUsize::new(0));
	let observer = {
		let signals = signals.clone();

		move |_: &RefreshRejected| {
			signals.fetch_add(1, Ordering::SeqCst);
		}
	};
	let client = client(&server, store.clone()).with_observer(Arc::new(observer));

	mock_projects(&server).await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH);
			then.status(401)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(250))
				.body("{\"detail\":\"Token is invalid or expired\",\"code\":\"token_not_valid\"}");
		})
		.await;
	let mut handles = Vec::new();

	for _ in 0..3 {
		let client = client.clone();

		handles.push(tokio::spawn(async move {
			client.send(RequestDescriptor::get("projects/")).await
		}));
	}

	for handle in handles {
		let err = handle
			.await
			.expect("Request task should not panic.")
			.expect_err("Every request should observe the expired session.");

		assert!(err.is_session_expired());
		assert!(matches!(err, Error::SessionExpired(_)));
	}

	refresh.assert_calls_async(1).await;

	assert!(store.is_empty());
	assert!(!client.is_signed_in());
	assert_eq!(signals.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejection_reason_comes_from_the_provider() {
	let server = MockServer::start_async().await;
	let store = seeded_store("A1", "R1").await;
	let client = client(&server, store);

	mock_projects(&server).await;
	server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH);
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"detail\":\"Token is blacklisted\",\"code\":\"token_not_valid\"}");
		})
		.await;

	let err = client
		.send(RequestDescriptor::get("projects/"))
		.await
		.expect_err("A refused refresh should expire the session.");
	let rejection = match err {
		Error::SessionExpired(rejection) => rejection,
		other => panic!("Unexpected error: {other:?}."),
	};

	assert_eq!(rejection.kind, RejectionKind::Provider);
	assert_eq!(rejection.status, Some(401));
	assert_eq!(rejection.reason, "Token is blacklisted");
}
