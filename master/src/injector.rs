use std::{sync::Arc, time::Duration};

use common::FaultPolicy;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::state::{DeathCause, StateStore};

/// Inyector de caídas de nodo.
///
/// Para cada caída: espera a que haya al menos una tarea en cola, deja pasar
/// el retardo de la política y tumba un nodo elegido entre los vivos en ese
/// momento. Nunca provoca una caída antes de que exista trabajo.
pub async fn run_injector(
    state: Arc<StateStore>,
    faults: Arc<dyn FaultPolicy>,
    max_injections: u32,
    poll: Duration,
) {
    for _ in 0..max_injections {
        while state.queue_depth() == 0 {
            if !state.is_accepting() {
                debug!("inyector: cluster cerrando, sin más caídas");
                return;
            }
            sleep(poll).await;
        }

        sleep(faults.injection_delay()).await;

        let alive = state.alive_nodes();
        let Some(victim) = faults.choose_victim(&alive) else {
            debug!("inyector: no quedan nodos vivos");
            return;
        };

        info!("inyector: tumbando {}", victim);
        state.mark_node_dead(&victim, DeathCause::Injected);
    }
}
