use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Executor as _;
use toon_macros::ValueRepository;

//these are required for macro to work

pub use toon_dal::{Batch, ChosenDB, ListingParams, Order};
pub mod error {
    pub use toon_dal::error::{Error, Result};
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate, ValueRepository)]
pub struct CreateColor {
    #[garde(length(min = 1, max = 255))]
    name: String,
    #[garde(length(min = 1, max = 16))]
    code: String,
    #[garde(range(min = 0))]
    version: Option<i64>,
}

async fn init_db() -> sqlx::Pool<sqlx::Sqlite> {
    let conn = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    conn.execute(
        "CREATE TABLE color (id INTEGER PRIMARY KEY, name TEXT NOT NULL, code TEXT NOT NULL, version INTEGER NOT NULL)",
    )
    .await
    .unwrap();
    conn
}

#[test]
fn test_generated_types() {
    let color = CreateColor {
        name: "Ink".to_string(),
        code: "#000".to_string(),
        version: None,
    };
    assert!(color.validate().is_ok());

    let _full = Color {
        id: 1,
        name: "Ink".to_string(),
        code: "#000".to_string(),
        version: 1,
    };

    assert_eq!(VALID_ORDER_FIELDS, &["id", "name", "code"]);
}

#[tokio::test]
async fn test_repository_roundtrip() {
    let repo = ColorRepositoryImpl::new(init_db().await);
    let ink = repo
        .create(CreateColor {
            name: "Ink".to_string(),
            code: "#000".to_string(),
            version: None,
        })
        .await
        .unwrap();
    assert_eq!(ink.version, 1);
    repo.create(CreateColor {
        name: "Paper".to_string(),
        code: "#fff".to_string(),
        version: None,
    })
    .await
    .unwrap();

    let batch = repo
        .list(ListingParams::default().with_order(vec![Order::Desc("name".to_string())]))
        .await
        .unwrap();
    assert_eq!(batch.total, 2);
    assert_eq!(batch.rows[0].name, "Paper");

    let stale = CreateColor {
        name: "Black ink".to_string(),
        code: "#000".to_string(),
        version: Some(7),
    };
    assert!(matches!(
        repo.update(ink.id, stale).await,
        Err(toon_dal::Error::FailedUpdate { .. })
    ));

    let updated = repo
        .update(
            ink.id,
            CreateColor {
                name: "Black ink".to_string(),
                code: "#000".to_string(),
                version: Some(1),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.version, 2);

    repo.delete(ink.id).await.unwrap();
    assert!(matches!(
        repo.delete(ink.id).await,
        Err(toon_dal::Error::RecordNotFound(_))
    ));
    assert_eq!(repo.count().await.unwrap(), 1);
}
