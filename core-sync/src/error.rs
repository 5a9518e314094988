use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("A synchronization session is already running")]
    SyncInProgress,
}

pub type Result<T> = std::result::Result<T, SyncError>;
