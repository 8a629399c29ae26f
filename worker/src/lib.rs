//! Nodos simulados: loop de trabajo y heartbeat de cada nodo.
//!
//! Ambos hablan con el master a través de [`common::Coordinator`].

pub mod heartbeat;
pub mod worker;

pub use heartbeat::run_heartbeat;
pub use worker::{run, NodeSettings};

#[cfg(test)]
mod fake;
