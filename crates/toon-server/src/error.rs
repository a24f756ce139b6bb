pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] clap::Error),
    #[error("Database error: {0}")]
    Database(#[from] toon_dal::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),
}
