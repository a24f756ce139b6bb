use std::io::Cursor;

use axum::{
    Router,
    body::{Body, to_bytes},
};
use http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;
use toon_app::state::{AppConfig, AppState};
use toon_store::{Store as _, ValidPath};
use tower::ServiceExt as _;
use tracing_test::traced_test;

struct TestApp {
    router: Router,
    state: AppState,
    _files: TempDir,
}

async fn test_app() -> TestApp {
    let files = tempfile::tempdir().unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    toon_dal::migrate(&pool).await.unwrap();
    let config = AppConfig {
        base_url: "http://localhost:3000".parse().unwrap(),
        file_store_path: files.path().to_path_buf(),
        upload_limit_mb: 10,
        default_page_size: 50,
    };
    let state = AppState::new(config, pool);
    let router = Router::new()
        .nest("/api", toon_app::api_router(10))
        .with_state(state.clone());
    TestApp {
        router,
        state,
        _files: files,
    }
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    async fn setup_series(&self) -> i64 {
        let (status, user) = self
            .post(
                "/api/user",
                json!({"email": "ink@example.com", "name": "Inker", "roles": ["creator"]}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, series) = self
            .post(
                "/api/series",
                json!({"title": "Moon Harbor", "status": "live", "created_by": user["id"]}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(series["slug"], "moon-harbor");
        series["id"].as_i64().unwrap()
    }

    async fn add_page(&self, series_id: i64, chapter_id: i64, status: &str) -> Value {
        let (code, page) = self
            .post(
                "/api/page",
                json!({"series_id": series_id, "chapter_id": chapter_id, "status": status}),
            )
            .await;
        assert_eq!(code, StatusCode::CREATED);
        page
    }
}

fn ids(values: &Value) -> Vec<i64> {
    values
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
#[traced_test]
async fn test_pages_get_numbers_and_links() {
    let app = test_app().await;
    let series_id = app.setup_series().await;

    let (status, ch1) = app
        .post("/api/chapter", json!({"series_id": series_id, "title": "Arrival"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, ch2) = app
        .post("/api/chapter", json!({"series_id": series_id, "title": "Storm"}))
        .await;
    let ch1 = ch1["id"].as_i64().unwrap();
    let ch2 = ch2["id"].as_i64().unwrap();

    let late = app.add_page(series_id, ch2, "published").await;
    let p1 = app.add_page(series_id, ch1, "published").await;
    let p2 = app.add_page(series_id, ch1, "published").await;
    assert_eq!(p1["chapter_page_number"], 1);
    assert_eq!(p2["chapter_page_number"], 2);
    assert_eq!(p2["global_page_number"], 2);

    let (status, pages) = app.get(&format!("/api/series/{series_id}/pages")).await;
    assert_eq!(status, StatusCode::OK);
    let pages = pages.as_array().unwrap();
    assert_eq!(pages.len(), 3);
    let last = pages.iter().find(|p| p["id"] == late["id"]).unwrap();
    assert_eq!(last["global_page_number"], 3);
    assert_eq!(last["navigation"]["previous_page_id"], p2["id"]);
    assert_eq!(last["navigation"]["is_last"], true);

    let (_, series) = app.get(&format!("/api/series/{series_id}")).await;
    assert_eq!(series["stats"]["total_pages"], 3);
    assert_eq!(series["stats"]["total_chapters"], 2);

    // swap pages in first chapter
    let (status, res) = app
        .post(
            &format!("/api/admin/reorder-pages/{ch1}"),
            json!({"ordered_ids": [p2["id"], p1["id"]]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["updated"], 2);
    let (_, pages) = app.get(&format!("/api/chapter/{ch1}/pages")).await;
    assert_eq!(
        ids(&pages),
        vec![p2["id"].as_i64().unwrap(), p1["id"].as_i64().unwrap()]
    );

    let (status, res) = app
        .post(
            &format!("/api/admin/reorder-pages/{ch1}"),
            json!({"ordered_ids": [late["id"]]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{res}");

    // nothing left to fix
    let (status, res) = app
        .post(&format!("/api/admin/recalculate-navigation/{series_id}"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["updated"], 0);
    let (_, res) = app.post("/api/admin/recalculate-all", json!({})).await;
    assert_eq!(res["updated"], 0);

    let (status, deletion) = app
        .call(Method::DELETE, &format!("/api/chapter/{ch1}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deletion["moved_pages"], 2);
    let (_, chapters) = app.get(&format!("/api/series/{series_id}/chapters")).await;
    let titles = chapters
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["Storm", "Unassigned Pages"]);
}

#[tokio::test]
#[traced_test]
async fn test_validation_and_errors() {
    let app = test_app().await;
    let series_id = app.setup_series().await;

    let (status, _) = app
        .post(
            "/api/series",
            json!({"title": "Bad", "slug": "Not A Slug", "created_by": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, editor) = app
        .post(
            "/api/user",
            json!({"email": "ed@example.com", "name": "Editor", "roles": ["editor"]}),
        )
        .await;
    let (status, _) = app
        .post(
            "/api/series",
            json!({"title": "Nope", "created_by": editor["id"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/series",
            json!({"title": "Moon Harbor", "created_by": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post("/api/page", json!({"series_id": series_id, "chapter_id": 999}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app.get("/api/page/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/series?page_size=5000").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = app.get("/api/series?sort=password").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) = app.get("/api/series?page=1&page_size=10&sort=-title").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["total_pages"], 1);
}

#[tokio::test]
async fn test_value_entities() {
    let app = test_app().await;
    let (status, genre) = app
        .post("/api/genre", json!({"name": "Fantasy", "slug": "fantasy"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = genre["id"].as_i64().unwrap();

    let (status, updated) = app
        .call(
            Method::PUT,
            &format!("/api/genre/{id}"),
            Some(json!({"name": "High Fantasy", "slug": "high-fantasy", "version": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["version"], 2);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/genre/{id}"),
            Some(json!({"name": "Stale", "slug": "stale", "version": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, count) = app.get("/api/genre/count").await;
    assert_eq!(count, 1);
    let (status, _) = app
        .call(Method::DELETE, &format!("/api/genre/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/api/genre/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.post("/api/tag", json!({"name": "Pirates", "slug": "pirates"})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, tags) = app.get("/api/tag/all").await;
    assert_eq!(tags.as_array().unwrap().len(), 1);
}

fn sample_png() -> Vec<u8> {
    let img = image::RgbImage::from_fn(320, 480, |x, y| image::Rgb([x as u8, y as u8, 0]));
    let mut data = Cursor::new(Vec::new());
    img.write_to(&mut data, image::ImageFormat::Png).unwrap();
    data.into_inner()
}

#[tokio::test]
#[traced_test]
async fn test_media_and_publish() {
    let app = test_app().await;
    let series_id = app.setup_series().await;
    let (_, chapter) = app
        .post("/api/chapter", json!({"series_id": series_id, "title": "Arrival"}))
        .await;
    let chapter_id = chapter["id"].as_i64().unwrap();

    let upload = || {
        Request::builder()
            .method(Method::POST)
            .uri("/api/media?name=Harbor%20View.png&alt_text=harbor")
            .header("content-type", "image/png")
            .body(Body::from(sample_png()))
            .unwrap()
    };
    let response = app.router.clone().oneshot(upload()).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key("location"));
    let media: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(media["object_key"], "media/harbor-view.png");
    assert_eq!(media["sizes"].as_array().unwrap().len(), 4);
    let response = app.router.clone().oneshot(upload()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let media_id = media["id"].as_i64().unwrap();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/media/{media_id}/data?size=thumbnail"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");

    let (status, page) = app
        .post(
            "/api/page",
            json!({"series_id": series_id, "chapter_id": chapter_id, "status": "published",
                   "images": [media_id]}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(page["images"], json!([media_id]));
    app.add_page(series_id, chapter_id, "draft").await;

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/media/{media_id}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, res) = app.post("/api/admin/publish", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["updated"], 1);

    let store = app.state.store();
    let index: Value = serde_json::from_slice(
        &store
            .load_bytes(&ValidPath::new("pub/index.json").unwrap())
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(index[0]["slug"], "moon-harbor");
    assert_eq!(index[0]["pageCount"], 1);

    let manifest: Value = serde_json::from_slice(
        &store
            .load_bytes(&ValidPath::new("pub/moon-harbor/manifest.json").unwrap())
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(manifest["navigation"]["totalPages"], 1);
    let pages = manifest["pages"].as_array().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0]["isFirst"], true);
    assert_eq!(pages[0]["isLast"], true);
    assert_eq!(
        pages[0]["images"][0]["sizes"].as_array().unwrap().len(),
        4
    );

    // series hidden again, its manifest goes away
    let (_, series) = app.get(&format!("/api/series/{series_id}")).await;
    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/series/{series_id}"),
            Some(json!({"title": "Moon Harbor", "status": "draft", "version": series["version"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, res) = app.post("/api/admin/publish", json!({})).await;
    assert_eq!(res["updated"], 0);
    assert_eq!(res["details"]["removed"], 1);
    assert!(
        !store
            .exists(&ValidPath::new("pub/moon-harbor/manifest.json").unwrap())
            .await
            .unwrap()
    );
}
