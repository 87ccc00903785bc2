use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("SinkError - Io: {0}")]
    Io(#[from] std::io::Error),
    #[error("SinkError - Serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
