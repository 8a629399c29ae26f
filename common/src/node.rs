use serde::{Deserialize, Serialize};

/// Nombre del nodo simulado, ej: "Node1".
pub type NodeName = String;

/// Estado visible de un nodo.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeView {
    pub name: NodeName,
    pub alive: bool,
    pub last_heartbeat_ms_ago: u64,
    /// Tareas que tiene asignadas ahora mismo
    pub active_tasks: u32,
    pub tasks_started: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
}
