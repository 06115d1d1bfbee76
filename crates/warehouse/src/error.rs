use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to read script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("simulated failure: {0}")]
    Simulated(String),

    #[error("{0}")]
    Other(String),
}
