#![allow(dead_code)]

use axum_test::TestServer;
use chrono::{DateTime, Utc};
use ferryline_service::create_app;
use ferryline_service::test_helpers::{TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD, TestApp};
use serde_json::json;

pub fn create_test_server(app: &TestApp) -> TestServer {
    TestServer::new(create_app(app.state.clone())).unwrap()
}

/// Server whose session has been restored, with the operator logged in
/// through the API.
pub async fn signed_in_server() -> (TestServer, TestApp) {
    let app = TestApp::restored().await;
    let server = create_test_server(&app);

    server
        .post("/admin/login")
        .json(&json!({ "email": TEST_ADMIN_EMAIL, "password": TEST_ADMIN_PASSWORD }))
        .await
        .assert_status_ok();

    (server, app)
}

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}
