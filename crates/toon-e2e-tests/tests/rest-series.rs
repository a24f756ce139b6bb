use toon_e2e_tests::{
    launch_env, prepare_env,
    rest::{create_chapter, create_page, create_series, create_user, get_json},
};
use tracing::info;
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn test_paging() {
    let (args, _config_guard) = prepare_env("rest-paging").await.unwrap();
    let pool = toon_dal::new_pool(&args.database_url()).await.unwrap();
    toon_dal::migrate(&pool).await.unwrap();

    let mut count = 0;
    let mut transaction = pool.begin().await.unwrap();
    for c1 in 'a'..='z' {
        for c2 in 'a'..='z' {
            let name = format!("Genre-{}{}", c1, c2);
            let slug = format!("genre-{}{}", c1, c2);
            sqlx::query("INSERT INTO genre (name, slug, version) VALUES (?, ?, 1)")
                .bind(&name)
                .bind(&slug)
                .execute(&mut *transaction)
                .await
                .unwrap();
            count += 1;
        }
    }
    transaction.commit().await.unwrap();
    info!("Created {} genres", count);

    let server = launch_env(args).await.unwrap();
    let page = get_json(&server, "api/genre?page=2&page_size=100&sort=name")
        .await
        .unwrap();
    assert_eq!(page["total"], count);
    assert_eq!(page["total_pages"], 7);
    assert_eq!(page["rows"].as_array().unwrap().len(), 100);
    assert_eq!(page["rows"][0]["name"], "Genre-dw");

    let all = get_json(&server, "api/genre/all").await.unwrap();
    assert_eq!(all.as_array().unwrap().len(), count);
}

#[tokio::test]
#[traced_test]
async fn test_series_flow_and_publish() {
    let (args, _config_guard) = prepare_env("rest-series").await.unwrap();
    let files_dir = args.files_dir();
    let server = launch_env(args).await.unwrap();

    let user = create_user(&server, "ink@example.com", "Inker").await.unwrap();
    let series = create_series(&server, "Night Shift", user["id"].as_i64().unwrap())
        .await
        .unwrap();
    let series_id = series["id"].as_i64().unwrap();
    assert_eq!(series["slug"], "night-shift");

    let chapter = create_chapter(&server, series_id, "Opening").await.unwrap();
    let chapter_id = chapter["id"].as_i64().unwrap();
    let first = create_page(&server, series_id, chapter_id, "published")
        .await
        .unwrap();
    let second = create_page(&server, series_id, chapter_id, "published")
        .await
        .unwrap();
    create_page(&server, series_id, chapter_id, "draft")
        .await
        .unwrap();
    assert_eq!(second["global_page_number"], 2);
    assert_eq!(second["navigation"]["previous_page_id"], first["id"]);

    let series = get_json(&server, &format!("api/series/{series_id}"))
        .await
        .unwrap();
    assert_eq!(series["stats"]["total_pages"], 2);

    let response = server
        .client
        .post(server.url("api/admin/publish").unwrap())
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["updated"], 1);

    let index: serde_json::Value =
        serde_json::from_slice(&std::fs::read(files_dir.join("pub/index.json")).unwrap()).unwrap();
    assert_eq!(index[0]["slug"], "night-shift");
    assert_eq!(index[0]["pageCount"], 2);

    let manifest: serde_json::Value = serde_json::from_slice(
        &std::fs::read(files_dir.join("pub/night-shift/manifest.json")).unwrap(),
    )
    .unwrap();
    let pages = manifest["pages"].as_array().unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1]["isLast"], true);
}
