//! Demonstrates a session against a mock identity provider: sign in, survive an access-token
//! expiry with one transparent refresh shared by concurrent requests, then sign out.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use session_broker::{
	ext::WatchSessionObserver,
	flows::ReqwestSessionClient,
	http::RequestDescriptor,
	provider::ApiDescriptor,
	store::CredentialStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let sign_in = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access\":\"demo-access-1\",\"refresh\":\"demo-refresh-1\"}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/refresh/");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access\":\"demo-access-2\",\"refresh\":\"demo-refresh-2\"}");
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/projects/").header("authorization", "Bearer demo-access-1");
			then.status(401).body("{\"detail\":\"Token is invalid or expired\"}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/projects/").header("authorization", "Bearer demo-access-2");
			then.status(200)
				.header("content-type", "application/json")
				.body("[{\"id\":1,\"name\":\"Compilers\"}]");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/accounts/logout/");
			then.status(205);
		})
		.await;

	let descriptor = ApiDescriptor::builder(Url::parse(&server.url("/api/"))?).build()?;
	let (observer, expired) = WatchSessionObserver::channel();
	let client = ReqwestSessionClient::new(descriptor, Arc::new(CredentialStore::in_memory()))
		.with_observer(Arc::new(observer));

	client.sign_in("ada@example.com", "hunter2").await?;

	let (first, second, third) = tokio::join!(
		client.send(RequestDescriptor::get("projects/")),
		client.send(RequestDescriptor::get("projects/")),
		client.send(RequestDescriptor::get("projects/")),
	);

	for response in [first?, second?, third?] {
		println!("{} {}", response.status, response.text());
	}

	println!(
		"Refresh calls: {}, coalesced callers: {}.",
		client.coordinator.metrics().attempts(),
		client.coordinator.metrics().coalesced()
	);

	client.sign_out().await?;

	println!("Signed in after sign-out: {}.", client.is_signed_in());
	println!("Session expired signal raised: {}.", expired.borrow().is_some());

	sign_in.assert_async().await;
	refresh.assert_async().await;

	Ok(())
}
