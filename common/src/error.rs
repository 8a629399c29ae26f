use thiserror::Error;

/// Errores al enviar una tarea al cluster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Payload vacío o con valores que no son números.
    #[error("{0}")]
    InvalidInput(String),

    /// El scheduler ya está drenando la cola, no se aceptan tareas nuevas.
    #[error("cluster is shutting down, no new tasks accepted")]
    ShuttingDown,
}

impl SubmitError {
    pub fn invalid_numbers() -> Self {
        SubmitError::InvalidInput(
            "Invalid input! Use numbers separated by spaces (e.g., '25.0 26.8 24.7').".to_string(),
        )
    }
}
