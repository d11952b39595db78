//! Pipeline and storage errors.

/// Errors from a trip store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("trip has {0} flights, more than the store can index")]
    TooManyFlights(usize),
}

/// Errors starting a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    #[error("drain timeout must be non-zero")]
    ZeroDrainTimeout,

    #[error("pipeline needs at least one store")]
    NoWorkers,

    #[error("failed to spawn storage worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            PipelineError::NoWorkers.to_string(),
            "pipeline needs at least one store"
        );
        let err = PipelineError::from(StoreError::TooManyFlights(70_000));
        assert_eq!(
            err.to_string(),
            "store error: trip has 70000 flights, more than the store can index"
        );
    }
}
