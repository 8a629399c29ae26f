use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::SubmitError;
use crate::node::NodeName;
use crate::stats::Analysis;

pub type TaskId = u64;

/// Reintentos máximos antes de dar una tarea por fallida.
pub const MAX_RETRIES: u32 = 3;

/// Secuencia de números a analizar.
/// Sólo se construye validada: nunca vacía y sin NaN/infinitos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Payload(Vec<f64>);

impl Payload {
    pub fn new(values: Vec<f64>) -> Result<Self, SubmitError> {
        if values.is_empty() {
            return Err(SubmitError::InvalidInput(
                "Please enter at least one value.".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SubmitError::invalid_numbers());
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parsea números separados por espacios, ej: "25.0 26.8 24.7".
impl FromStr for Payload {
    type Err = SubmitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(|raw| raw.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| SubmitError::invalid_numbers())?;
        Self::new(values)
    }
}

impl TryFrom<Vec<f64>> for Payload {
    type Error = SubmitError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Payload> for Vec<f64> {
    fn from(p: Payload) -> Self {
        p.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Tarea inmutable: id asignado al enviarla + payload original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    /// En cola, nunca reintentada.
    Pending,
    /// Asignada a un nodo. La asignación vive sólo en este estado.
    InProgress { node: NodeName },
    /// De vuelta en la cola tras un fallo.
    Retrying { retries: u32 },
    Completed { result: Analysis },
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed { .. } | TaskStatus::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress { .. } => "in_progress",
            TaskStatus::Retrying { .. } => "retrying",
            TaskStatus::Completed { .. } => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Vista de una tarea para la capa de presentación.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    pub id: TaskId,
    pub payload: Payload,
    pub status: TaskStatus,
    pub retries: u32,
    /// Resultado ya formateado, sólo si está completada.
    pub result: Option<String>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}
