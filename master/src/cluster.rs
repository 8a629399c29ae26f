use std::sync::{Arc, Mutex, PoisonError};

use common::{ClusterSnapshot, FaultPolicy, Payload, SubmitError, Summary, TaskId, TaskView};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ClusterConfig;
use crate::failover;
use crate::injector;
use crate::state::StateStore;

/// Cluster simulado en marcha: un worker y un heartbeat por nodo, el
/// scheduler y el inyector de fallos, todos sobre el mismo [`StateStore`].
///
/// Es lo único que ve la capa de presentación: enviar tareas, leer el estado
/// y pedir el resumen.
#[derive(Clone)]
pub struct Cluster {
    state: Arc<StateStore>,
    scheduler: Arc<Mutex<Option<JoinHandle<Summary>>>>,
}

impl Cluster {
    /// Arranca todos los loops. Debe llamarse dentro de un runtime de tokio.
    pub fn start(config: &ClusterConfig, faults: Arc<dyn FaultPolicy>) -> Self {
        let state = Arc::new(StateStore::new(config.nodes.iter().cloned()));

        for node in &config.nodes {
            tokio::spawn(worker::run_heartbeat(
                state.clone(),
                node.clone(),
                config.heartbeat_interval,
            ));
            tokio::spawn(worker::run(
                state.clone(),
                faults.clone(),
                node.clone(),
                config.node_settings(),
            ));
        }

        tokio::spawn(injector::run_injector(
            state.clone(),
            faults,
            config.max_injections,
            config.idle_backoff,
        ));

        let scheduler = tokio::spawn(failover::run_failover_loop(
            state.clone(),
            config.sweep_interval,
            config.stale_after,
        ));

        info!("cluster arrancado con {} nodos", config.nodes.len());

        Self {
            state,
            scheduler: Arc::new(Mutex::new(Some(scheduler))),
        }
    }

    pub fn submit(&self, payload: Payload) -> Result<TaskId, SubmitError> {
        self.state.submit(payload)
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        self.state.snapshot()
    }

    pub fn task(&self, id: TaskId) -> Option<TaskView> {
        self.state.task_view(id)
    }

    /// Resumen bajo demanda, sin esperar al cierre. Queda también en el log.
    pub fn request_summary(&self) -> Summary {
        let summary = self.state.summary();
        self.state.log_event(summary.to_string());
        summary
    }

    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    /// Deja de aceptar tareas, espera a que el scheduler drene y devuelve
    /// el resumen final. Llamadas repetidas devuelven el resumen actual.
    pub async fn shutdown(&self) -> Summary {
        self.state.stop_accepting();

        let handle = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match handle {
            Some(h) => match h.await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!("scheduler terminó con error: {:?}", e);
                    self.state.summary()
                }
            },
            None => self.state.summary(),
        }
    }
}
