use async_trait::async_trait;
use std::time::Duration;

use crate::stats::Analysis;
use crate::task::{Task, TaskId};

/// Resultado de una transición de estado pedida por un worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Completed,
    /// Volvió a la cola con este número de reintentos consumidos.
    Retrying { retries: u32 },
    Failed,
    /// El nodo ya no era dueño de la tarea (fue reasignada), se descarta.
    Stale,
}

/// Lo que un worker necesita del master: heartbeat, pedir tarea y reportar.
///
/// Cada operación es atómica del lado del master: quien lea el estado nunca
/// ve una transición a medias.
#[async_trait]
pub trait Coordinator: Send + Sync + 'static {
    fn is_alive(&self, node: &str) -> bool;

    /// Refresca el heartbeat del nodo. Devuelve `false` si ya está muerto.
    fn heartbeat(&self, node: &str) -> bool;

    /// Reclama la siguiente tarea de la cola, esperando como mucho `wait`.
    /// `None` es el caso normal de cola vacía (o nodo muerto).
    async fn next_task(&self, node: &str, wait: Duration) -> Option<Task>;

    fn complete_task(&self, node: &str, task_id: TaskId, analysis: Analysis) -> Transition;

    /// Intento fallido: reencola si queda presupuesto de reintentos, si no
    /// la marca como fallida.
    fn fail_attempt(&self, node: &str, task_id: TaskId) -> Transition;

    fn record_event(&self, message: String);
}
