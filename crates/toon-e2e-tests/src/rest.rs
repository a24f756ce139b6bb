use anyhow::{Result, ensure};
use serde_json::{Value, json};
use tracing::info;

use crate::RunningServer;

async fn post_json(server: &RunningServer, path: &str, payload: Value) -> Result<Value> {
    let response = server
        .client
        .post(server.url(path)?)
        .json(&payload)
        .send()
        .await?;
    info!("Response for {path}: {}", response.status());
    ensure!(
        response.status().as_u16() == 201,
        "Unexpected status {} for {path}",
        response.status()
    );
    Ok(response.json().await?)
}

pub async fn create_user(server: &RunningServer, email: &str, name: &str) -> Result<Value> {
    post_json(
        server,
        "api/user",
        json!({"email": email, "name": name, "roles": ["creator"]}),
    )
    .await
}

pub async fn create_series(
    server: &RunningServer,
    title: &str,
    created_by: i64,
) -> Result<Value> {
    post_json(
        server,
        "api/series",
        json!({"title": title, "status": "live", "created_by": created_by}),
    )
    .await
}

pub async fn create_chapter(server: &RunningServer, series_id: i64, title: &str) -> Result<Value> {
    post_json(
        server,
        "api/chapter",
        json!({"series_id": series_id, "title": title}),
    )
    .await
}

pub async fn create_page(
    server: &RunningServer,
    series_id: i64,
    chapter_id: i64,
    status: &str,
) -> Result<Value> {
    post_json(
        server,
        "api/page",
        json!({"series_id": series_id, "chapter_id": chapter_id, "status": status}),
    )
    .await
}

pub async fn get_json(server: &RunningServer, path: &str) -> Result<Value> {
    let response = server.client.get(server.url(path)?).send().await?;
    ensure!(
        response.status().is_success(),
        "Unexpected status {} for {path}",
        response.status()
    );
    Ok(response.json().await?)
}
