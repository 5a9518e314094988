use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to fetch asset list: {0}")]
    Fetch(String),

    #[error("Asset list response is not a JSON object")]
    MalformedList,

    #[error("No library root configured")]
    NoLibraryRoot,
}

pub type Result<T> = std::result::Result<T, CatalogError>;
