use subgrab_engine::SubgrabError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction error: {0}")]
    Extraction(#[from] SubgrabError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
