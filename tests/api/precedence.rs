use axum::http::{Method, StatusCode};

use crate::helpers::{self, TestApp};

#[tokio::test]
async fn api_prefix_wins_over_static_file_with_same_path() {
    // Arrange
    let test_app = TestApp::setup().await;
    assert!(test_app.static_root().join("api/health").is_file());

    // Act
    let response = test_app.app_server.get("/api/health").await;

    // Assert
    response.assert_status_ok();
    response.assert_json(&serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn files_under_api_prefix_are_never_served() {
    // Arrange
    let test_app = TestApp::setup().await;

    for path in ["/api/data.json", "/api", "/api/", "/api/unknown"] {
        // Act
        let response = test_app.app_server.get(path).await;

        // Assert
        response.assert_status_not_found();
        assert!(!response.text().contains("leaked"));
        assert!(!response.text().contains("<html>"));
    }
}

#[tokio::test]
async fn encoded_prefix_is_routed_as_api() {
    // Arrange
    let test_app = TestApp::setup().await;

    for uri in [
        "/%61pi/health",
        "/%61%70%69/health",
        "/assets/../api/health",
        "/./api/./health",
        "//api//health",
    ] {
        // Act
        let response = test_app.raw_request(Method::GET, uri).await;

        // Assert
        assert_eq!(response.status, StatusCode::OK, "{uri}");
        assert_eq!(response.text(), r#"{"status":"ok"}"#, "{uri}");
    }
}

#[tokio::test]
async fn encoded_prefix_cannot_reach_shadowed_files() {
    // Arrange
    let test_app = TestApp::setup().await;

    for uri in ["/%61pi/data.json", "/assets/..%2fapi%2fdata.json", "/x/../api/data.json"] {
        // Act
        let response = test_app.raw_request(Method::GET, uri).await;

        // Assert
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{uri}");
        assert!(!response.text().contains("leaked"), "{uri}");
    }
}

#[tokio::test]
async fn traversal_outside_root_is_rejected() {
    // Arrange
    let test_app = TestApp::setup().await;

    for uri in [
        "/../secret.txt",
        "/../../etc/passwd",
        "/assets/../../secret.txt",
        "/%2e%2e/secret.txt",
        "/%2e%2e/%2e%2e/etc/passwd",
        "/%2E%2E%2Fsecret.txt",
        "/assets/..%2f..%2fsecret.txt",
        "/..%5csecret.txt",
        "/api/../../secret.txt",
    ] {
        // Act
        let response = test_app.raw_request(Method::GET, uri).await;

        // Assert
        assert!(
            matches!(response.status, StatusCode::FORBIDDEN | StatusCode::NOT_FOUND),
            "{uri} answered {}",
            response.status
        );
        assert!(!response.text().contains(helpers::SECRET), "{uri}");
        assert!(!response.text().contains("root:"), "{uri}");
    }
}

#[tokio::test]
async fn traversal_is_rejected_even_without_fallback() {
    // Arrange
    let test_app = TestApp::setup_with(|c| c.assets.spa_fallback = false).await;

    // Act
    let response = test_app.raw_request(Method::GET, "/%2e%2e/secret.txt").await;

    // Assert
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(!response.text().contains(helpers::SECRET));
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_out_of_root_is_forbidden() {
    // Arrange
    let test_app = TestApp::setup().await;
    std::os::unix::fs::symlink(
        test_app.workspace.path().join("secret.txt"),
        test_app.static_root().join("leak.txt"),
    )
    .unwrap();
    std::os::unix::fs::symlink(test_app.workspace.path(), test_app.static_root().join("up"))
        .unwrap();

    for uri in ["/leak.txt", "/up/secret.txt"] {
        // Act
        let response = test_app.raw_request(Method::GET, uri).await;

        // Assert
        assert_eq!(response.status, StatusCode::FORBIDDEN, "{uri}");
        assert!(!response.text().contains(helpers::SECRET), "{uri}");
    }
}

#[tokio::test]
async fn parent_segments_inside_root_are_resolved() {
    // Arrange
    let test_app = TestApp::setup().await;

    // Act
    let response = test_app
        .raw_request(Method::GET, "/docs/../assets/./app.css")
        .await;

    // Assert
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), helpers::APP_CSS);
}
