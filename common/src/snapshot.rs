use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node::NodeView;
use crate::task::TaskView;

/// Foto consistente del cluster para la capa de presentación.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub generated_at: DateTime<Utc>,
    pub accepting: bool,
    pub nodes: Vec<NodeView>,
    pub alive_nodes: usize,
    pub queue_depth: usize,
    pub in_progress_count: usize,
    pub tasks: Vec<TaskView>,
    /// completadas / total * 100 (0 si no hay tareas)
    pub progress_percent: f64,
    pub events: Vec<String>,
}

impl ClusterSnapshot {
    /// Línea de estado estilo "Alive Nodes: 2, Pending: 1, In Progress: 1, Progress: 50.0%".
    pub fn status_line(&self) -> String {
        format!(
            "Alive Nodes: {}, Pending: {}, In Progress: {}, Progress: {:.1}%",
            self.alive_nodes, self.queue_depth, self.in_progress_count, self.progress_percent
        )
    }
}

/// Conteos finales (o parciales) de la ejecución.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub completed: usize,
    pub failed: usize,
    pub total_retries: u32,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Summary: Completed: {}, Failed: {}, Total Retries: {}",
            self.completed, self.failed, self.total_retries
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_usa_el_formato_del_log() {
        let s = Summary {
            completed: 4,
            failed: 1,
            total_retries: 6,
        };
        assert_eq!(s.to_string(), "Summary: Completed: 4, Failed: 1, Total Retries: 6");
    }

    #[test]
    fn status_line_redondea_progreso() {
        let snap = ClusterSnapshot {
            generated_at: Utc::now(),
            accepting: true,
            nodes: vec![],
            alive_nodes: 2,
            queue_depth: 1,
            in_progress_count: 1,
            tasks: vec![],
            progress_percent: 100.0 / 3.0,
            events: vec![],
        };
        assert_eq!(
            snap.status_line(),
            "Alive Nodes: 2, Pending: 1, In Progress: 1, Progress: 33.3%"
        );
    }
}
