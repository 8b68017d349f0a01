mod common;

use std::sync::Arc;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::{ids, missing_id, token, RecordingStore, TestApp};
use serde_json::{json, Value};

const ROLE_PERMISSIONS: &[&str] = &[
    "create roles",
    "create permissions",
    "add permissions to role",
    "get permissions from role",
    "get permission from role",
    "update permission from role",
    "remove permission from role",
    "get roles",
];

async fn role_with_permissions(app: &TestApp, admin: &str, names: &[&str]) -> Result<(String, Vec<String>)> {
    let role = app.create("roles", admin, common::role("dispatcher")).await?;
    let mut permissions = Vec::new();
    for name in names {
        permissions.push(app.create("permissions", admin, json!({ "name": name })).await?);
    }
    let (status, payload) = app
        .post(&format!("/api/roles/{}/permissions", role), admin, json!({ "permissions": permissions }))
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "add failed: {} {}", status, payload);
    Ok((role, permissions))
}

#[tokio::test]
async fn add_then_list_associated() -> Result<()> {
    let app = TestApp::new()?;
    let admin = token(ROLE_PERMISSIONS);
    let (role, permissions) = role_with_permissions(&app, &admin, &["get jobs", "get job"]).await?;

    let (status, payload) = app.get(&format!("/api/roles/{}/permissions", role), &admin).await?;
    assert_eq!(status, StatusCode::OK, "{}", payload);
    let mut listed = ids(&payload);
    listed.sort();
    let mut expected = permissions.clone();
    expected.sort();
    assert_eq!(listed, expected);

    let through = &payload["data"][0]["role_permission"];
    assert_eq!(through["role_id"], json!(role));
    Ok(())
}

#[tokio::test]
async fn adding_existing_links_is_idempotent() -> Result<()> {
    let app = TestApp::new()?;
    let admin = token(ROLE_PERMISSIONS);
    let (role, permissions) = role_with_permissions(&app, &admin, &["get jobs"]).await?;

    let (status, payload) = app
        .send(
            Method::PUT,
            &format!("/api/roles/{}/permissions", role),
            Some(&admin),
            Some(json!({ "permissions": permissions })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payload["data"], json!([]));

    let (_, payload) = app.get(&format!("/api/roles/{}/permissions", role), &admin).await?;
    assert_eq!(ids(&payload).len(), 1);
    Ok(())
}

#[tokio::test]
async fn add_requires_at_least_one_target() -> Result<()> {
    let app = TestApp::new()?;
    let admin = token(ROLE_PERMISSIONS);
    let role = app.create("roles", &admin, common::role("empty")).await?;

    let (status, payload) = app
        .post(&format!("/api/roles/{}/permissions", role), &admin, json!({ "permissions": [] }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["error"]["field"], "body.permissions");
    Ok(())
}

#[tokio::test]
async fn missing_owner_is_404_without_touching_links() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let app = TestApp::with_store(store.clone())?;
    let admin = token(ROLE_PERMISSIONS);
    let owner = missing_id();

    let (status, _) = app.get(&format!("/api/roles/{}/permissions", owner), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(&format!("/api/roles/{}/permissions", owner), &admin, json!({ "permissions": [missing_id()] }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .get(&format!("/api/roles/{}/permissions/{}", owner, missing_id()), &admin)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(store.association_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn item_writes_on_missing_worker_are_404_without_touching_links() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let app = TestApp::with_store(store.clone())?;
    let admin = token(&["create jobs", "update job from worker", "remove job from worker"]);
    let job = app.create("jobs", &admin, json!({ "title": "Survey" })).await?;
    let item = format!("/api/workers/{}/jobs/{}", missing_id(), job);

    let (status, payload) = app
        .send(Method::PUT, &item, Some(&admin), Some(json!({ "hours": 8 })))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", payload);

    let (status, payload) = app.send(Method::DELETE, &item, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", payload);

    let (status, _) = app
        .send(Method::DELETE, &format!("{}?force=true", item), Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(store.association_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn update_writes_relation_attributes() -> Result<()> {
    let app = TestApp::new()?;
    let admin = token(&[
        "create jobs",
        "create workers",
        "add workers to job",
        "update worker from job",
        "get worker from job",
    ]);
    let job = app.create("jobs", &admin, json!({ "title": "Survey" })).await?;
    let worker = app
        .create("workers", &admin, json!({ "first_name": "Lin", "last_name": "Chen" }))
        .await?;

    let (status, payload) = app
        .post(&format!("/api/jobs/{}/workers", job), &admin, json!({ "workers": [worker], "hours": 4 }))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", payload);
    assert_eq!(payload["data"][0]["hours"], json!(4));

    let item = format!("/api/jobs/{}/workers/{}", job, worker);
    let (status, payload) = app
        .send(Method::PATCH, &item, Some(&admin), Some(json!({ "hours": 6, "role": "lead" })))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", payload);
    assert_eq!(payload["data"]["id"], json!(worker));
    assert_eq!(payload["data"]["job_worker"]["hours"], json!(6));
    assert_eq!(payload["data"]["job_worker"]["role"], "lead");

    let (_, payload) = app.get(&item, &admin).await?;
    assert_eq!(payload["data"]["job_worker"]["role"], "lead");
    Ok(())
}

#[tokio::test]
async fn remove_soft_deletes_the_link() -> Result<()> {
    let app = TestApp::new()?;
    let admin = token(ROLE_PERMISSIONS);
    let (role, permissions) = role_with_permissions(&app, &admin, &["get jobs", "get job"]).await?;
    let item = format!("/api/roles/{}/permissions/{}", role, permissions[0]);

    let (status, _) = app.send(Method::DELETE, &item, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&item, &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, payload) = app.get(&format!("/api/roles/{}/permissions", role), &admin).await?;
    assert_eq!(ids(&payload), vec![permissions[1].clone()]);

    let (status, payload) = app.get(&format!("{}?paranoid=false", item), &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(payload["data"]["role_permission"]["deleted_at"].is_string());

    let (status, _) = app
        .send(Method::DELETE, &format!("{}?force=true&paranoid=false", item), Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("{}?paranoid=false", item), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn readding_a_removed_link_restores_it() -> Result<()> {
    let app = TestApp::new()?;
    let admin = token(ROLE_PERMISSIONS);
    let (role, permissions) = role_with_permissions(&app, &admin, &["get jobs"]).await?;
    let collection = format!("/api/roles/{}/permissions", role);
    let item = format!("{}/{}", collection, permissions[0]);

    let (status, _) = app.send(Method::DELETE, &item, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (_, payload) = app.get(&collection, &admin).await?;
    assert!(ids(&payload).is_empty());

    let (status, payload) = app
        .post(&collection, &admin, json!({ "permissions": permissions }))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", payload);
    let restored = payload["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0]["permission_id"], json!(permissions[0]));
    assert!(restored[0]["deleted_at"].is_null());
    assert!(restored[0]["deleted_by"].is_null());

    let (_, payload) = app.get(&collection, &admin).await?;
    assert_eq!(ids(&payload), permissions);
    let (status, payload) = app.get(&item, &admin).await?;
    assert_eq!(status, StatusCode::OK, "{}", payload);
    assert!(payload["data"]["role_permission"]["deleted_at"].is_null());

    let (status, payload) = app
        .post(&collection, &admin, json!({ "permissions": permissions }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payload["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn include_eager_loads_associations() -> Result<()> {
    let app = TestApp::new()?;
    let admin = token(ROLE_PERMISSIONS);
    let (role, _) = role_with_permissions(&app, &admin, &["get jobs"]).await?;

    let (status, payload) = app.get("/api/roles?include=permissions", &admin).await?;
    assert_eq!(status, StatusCode::OK, "{}", payload);
    let row = payload["data"]
        .as_array()
        .and_then(|rows| rows.iter().find(|r| r["id"] == json!(role)))
        .cloned()
        .unwrap_or(Value::Null);
    assert_eq!(row["permissions"].as_array().map(Vec::len), Some(1));
    Ok(())
}
