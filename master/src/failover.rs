use std::sync::Arc;
use std::time::Duration;

use common::Summary;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::state::StateStore;

/// Loop principal de tolerancia a fallos:
/// - cada `period` detecta nodos sin heartbeat y los marca muertos
/// - sus tareas en curso vuelven a la cola (o fallan sin reintentos)
///
/// Cuando el store deja de aceptar trabajo, drena y devuelve el resumen.
pub async fn run_failover_loop(
    state: Arc<StateStore>,
    period: Duration,
    stale_after: Duration,
) -> Summary {
    while state.is_accepting() {
        sleep(period).await;
        sweep_once(&state, stale_after);
    }

    info!("scheduler cerrando, drenando tareas pendientes");
    drain(&state, period).await
}

/// Una pasada de chequeo. Devuelve los nodos marcados muertos en ella.
pub fn sweep_once(state: &StateStore, stale_after: Duration) -> Vec<String> {
    let dead = state.reap_stale(stale_after);
    for node in &dead {
        warn!("marcando nodo {} como DEAD (sin heartbeat hace más de {:?})", node, stale_after);
    }
    dead
}

/// Espera a que no quede nada en cola ni en curso y registra el resumen.
///
/// Si no queda ningún nodo vivo, lo que siga en cola ya no se puede procesar
/// y se marca como fallido.
pub async fn drain(state: &StateStore, poll: Duration) -> Summary {
    loop {
        if state.is_quiescent() {
            break;
        }
        if state.alive_nodes().is_empty() {
            let abandoned = state.abandon_queued();
            warn!("sin nodos vivos, {} tareas abandonadas", abandoned);
            if state.is_quiescent() {
                break;
            }
        }
        sleep(poll).await;
    }

    let summary = state.summary();
    state.log_event(summary.to_string());
    state.log_event("All tasks completed or no nodes available.".to_string());
    summary
}
