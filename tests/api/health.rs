use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};

use crate::helpers::TestApp;

#[tokio::test]
async fn health_check_works() {
    // Arrange
    let test_app = TestApp::setup().await;

    // Act
    let response = test_app.app_server.get("/api/health").await;

    // Assert
    response.assert_status_ok();
    response.assert_json(&serde_json::json!({ "status": "ok" }));
    assert_eq!(
        response.header(header::CONTENT_TYPE),
        HeaderValue::from_static("application/json")
    );
}

#[tokio::test]
async fn health_check_ignores_query_and_headers() {
    // Arrange
    let test_app = TestApp::setup().await;

    // Act
    let response = test_app
        .app_server
        .get("/api/health")
        .add_query_param("verbose", "true")
        .add_header(
            HeaderName::from_static("x-probe"),
            HeaderValue::from_static("kubelet"),
        )
        .await;

    // Assert
    response.assert_status_ok();
    response.assert_json(&serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn health_check_rejects_other_methods() {
    // Arrange
    let test_app = TestApp::setup().await;

    // Act & Assert
    for response in [
        test_app.app_server.post("/api/health").await,
        test_app.app_server.put("/api/health").await,
        test_app.app_server.delete("/api/health").await,
        test_app.app_server.patch("/api/health").await,
    ] {
        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.header(header::ALLOW),
            HeaderValue::from_static("GET")
        );
    }

    let options = test_app.raw_request(Method::OPTIONS, "/api/health").await;
    assert_eq!(options.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(options.headers[header::ALLOW], "GET");
}

#[tokio::test]
async fn health_check_rejects_head() {
    // Arrange
    let test_app = TestApp::setup().await;

    // Act
    let response = test_app.raw_request(Method::HEAD, "/api/health").await;

    // Assert
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers[header::ALLOW], "GET");
}

#[tokio::test]
async fn health_check_with_trailing_slash_works() {
    // Arrange
    let test_app = TestApp::setup().await;

    // Act
    let response = test_app.app_server.get("/api/health/").await;

    // Assert
    response.assert_status_ok();
    response.assert_json(&serde_json::json!({ "status": "ok" }));
}
