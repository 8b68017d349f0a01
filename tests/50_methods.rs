mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::{error_code, token, TestApp};

#[tokio::test]
async fn unsupported_methods_get_the_error_envelope() -> Result<()> {
    let app = TestApp::new()?;
    let admin = token(&["get roles"]);

    let (status, payload) = app.send(Method::DELETE, "/api/roles", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(payload["success"], false);
    assert_eq!(error_code(&payload), "METHOD_NOT_ALLOWED");

    let (status, _) = app
        .send(Method::POST, &format!("/api/roles/{}", common::missing_id()), Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_404() -> Result<()> {
    let app = TestApp::new()?;
    let admin = token(&["get roles"]);

    let (status, payload) = app.get("/api/spaceships", &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&payload), "NOT_FOUND");

    // permissions have no associations
    let (status, _) = app
        .get(&format!("/api/permissions/{}/roles", common::missing_id()), &admin)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
