use toon_e2e_tests::{launch_env, prepare_env};
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn test_health() {
    let (args, _config_guard) = prepare_env("server-health").await.unwrap();
    let server = launch_env(args).await.unwrap();

    let response = server
        .client
        .get(server.url("health").unwrap())
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");

    let response = server
        .client
        .get(server.url("api/series/999").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
