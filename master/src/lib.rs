//! Master del cluster simulado: estado compartido, scheduler, inyector de
//! fallos y frontera HTTP.

pub mod cluster;
pub mod config;
pub mod failover;
pub mod handlers;
pub mod injector;
pub mod queue;
pub mod state;

pub use cluster::Cluster;
pub use config::ClusterConfig;
pub use state::{DeathCause, StateStore};
