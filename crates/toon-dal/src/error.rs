pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid order by field: {0}")]
    InvalidOrderByField(String),

    #[error("Missing version")]
    MissingVersion,

    #[error("Failed update of record {id} with version {version}")]
    FailedUpdate { id: i64, version: i64 },

    #[error("Delete of {entity} {id} was not confirmed")]
    DeleteNotConfirmed { entity: String, id: i64 },

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid reorder request: {0}")]
    InvalidReorder(String),

    #[error("Operation not allowed: {0}")]
    InvalidOperation(String),
}
