use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("Counter store error: {0}")]
    StoreError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),
}
