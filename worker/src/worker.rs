use common::{stats, Coordinator, FaultPolicy, NodeName, Transition};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Tiempos del loop de un nodo.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// Espera máxima al pedir tarea a la cola.
    pub poll_timeout: Duration,
    /// Pausa cuando la cola estaba vacía.
    pub idle_backoff: Duration,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            idle_backoff: Duration::from_millis(500),
        }
    }
}

/// Loop principal de un nodo.
/// - Mientras esté vivo, pide tareas a la cola.
/// - Cada intento puede fallar según la política de fallos.
/// - Si no falla, analiza el payload y publica el resultado.
///
/// Termina cuando el nodo aparece como muerto al inicio de una iteración.
pub async fn run<C: Coordinator>(
    coordinator: Arc<C>,
    faults: Arc<dyn FaultPolicy>,
    node: NodeName,
    settings: NodeSettings,
) {
    info!("nodo {} arrancado", node);

    loop {
        if !coordinator.is_alive(&node) {
            coordinator.record_event(format!("{} has shut down.", node));
            break;
        }

        // El id de la tarea sólo existe si la reclamamos en esta iteración
        let Some(task) = coordinator.next_task(&node, settings.poll_timeout).await else {
            sleep(settings.idle_backoff).await;
            continue;
        };

        if faults.should_fail() {
            match coordinator.fail_attempt(&node, task.id) {
                Transition::Retrying { retries } => {
                    debug!("nodo {}: tarea {} reencolada (retry {})", node, task.id, retries)
                }
                Transition::Failed => warn!("nodo {}: tarea {} sin reintentos", node, task.id),
                other => debug!("nodo {}: fallo de tarea {} -> {:?}", node, task.id, other),
            }
            continue;
        }

        let analysis = stats::analyze(&task.payload);
        sleep(faults.processing_latency()).await;

        if coordinator.complete_task(&node, task.id, analysis) == Transition::Stale {
            warn!(
                "nodo {}: resultado de tarea {} descartado, ya no era suya",
                node, task.id
            );
        }
    }

    info!("nodo {} detenido", node);
}
