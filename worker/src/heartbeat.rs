use common::{Coordinator, NodeName};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::debug;

/// Intervalo de heartbeat por defecto.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// Refresca el heartbeat del nodo cada `interval` mientras siga vivo.
///
/// Corre aparte del loop de trabajo, así el nodo late aunque esté ocupado
/// con una tarea. Cuando ve el nodo muerto se detiene para siempre.
pub async fn run_heartbeat<C: Coordinator>(coordinator: Arc<C>, node: NodeName, interval: Duration) {
    while coordinator.heartbeat(&node) {
        sleep(interval).await;
    }
    debug!("heartbeat de {} detenido", node);
}
