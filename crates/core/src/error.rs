#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{count} events report Running; at most one may be active")]
    MultipleRunning { count: usize },
}
