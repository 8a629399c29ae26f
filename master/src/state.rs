// master/src/state.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Analysis, ClusterSnapshot, Coordinator, NodeName, NodeView, Payload, SubmitError, Summary,
    Task, TaskId, TaskStatus, TaskView, Transition, MAX_RETRIES,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{
    sync::Notify,
    time::{timeout_at, Instant},
};
use tracing::{info, warn};

use crate::queue::TaskQueue;

/// Por qué se marcó un nodo como muerto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    /// Caída simulada por el inyector de fallos.
    Injected,
    /// El scheduler no vio heartbeat a tiempo.
    MissedHeartbeat,
}

/// Estado compartido del cluster: tareas, cola, nodos y log de eventos.
///
/// Todo vive detrás de un único lock y cada operación pública es una
/// transición completa, así nadie observa estados a medias (p.ej. una tarea
/// fuera de la cola pero todavía sin asignar).
pub struct StateStore {
    inner: Mutex<Inner>,
    // despierta a los workers esperando en la cola
    queue_ready: Notify,
}

#[derive(Debug, Clone)]
pub struct NodeMeta {
    pub alive: bool,
    pub last_heartbeat: Instant,

    // Métricas
    pub tasks_started: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
}

impl NodeMeta {
    fn new(now: Instant) -> Self {
        Self {
            alive: true,
            last_heartbeat: now,
            tasks_started: 0,
            tasks_succeeded: 0,
            tasks_failed: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct TaskRecord {
    task: Task,
    status: TaskStatus,
    retries: u32,
    submitted_at: DateTime<Utc>,
}

impl TaskRecord {
    fn view(&self) -> TaskView {
        let result = match &self.status {
            TaskStatus::Completed { result } => Some(result.to_string()),
            _ => None,
        };
        TaskView {
            id: self.task.id,
            payload: self.task.payload.clone(),
            status: self.status.clone(),
            retries: self.retries,
            result,
            submitted_at: self.submitted_at,
        }
    }

    fn owned_by(&self, node: &str) -> bool {
        matches!(&self.status, TaskStatus::InProgress { node: n } if n == node)
    }
}

struct Inner {
    accepting: bool,
    next_id: TaskId,
    tasks: BTreeMap<TaskId, TaskRecord>,
    queue: TaskQueue,
    nodes: BTreeMap<NodeName, NodeMeta>,
    events: Vec<String>,
}

impl Inner {
    fn log(&mut self, message: String) {
        info!("{}", message);
        self.events.push(message);
    }

    /// Consume un reintento y devuelve la tarea a la cola, o la marca como
    /// fallida si ya no quedan. Sólo para tareas en curso.
    fn release(&mut self, id: TaskId) -> Transition {
        let Some(record) = self.tasks.get_mut(&id) else {
            return Transition::Stale;
        };

        if record.retries < MAX_RETRIES {
            record.retries += 1;
            let retries = record.retries;
            record.status = TaskStatus::Retrying { retries };
            self.queue.enqueue(id);
            Transition::Retrying { retries }
        } else {
            record.status = TaskStatus::Failed;
            Transition::Failed
        }
    }

    /// Marca el nodo como muerto y libera sus tareas en curso.
    /// Devuelve cuántas tareas volvieron a la cola, `None` si ya estaba muerto.
    fn kill(&mut self, node: &str, cause: DeathCause) -> Option<usize> {
        let meta = self.nodes.get_mut(node)?;
        if !meta.alive {
            return None;
        }
        meta.alive = false;

        match cause {
            DeathCause::Injected => self.log(format!("Simulated failure: {} is down!", node)),
            DeathCause::MissedHeartbeat => {
                self.log(format!("Scheduler detected {} failed (no heartbeat)", node))
            }
        }

        let orphaned: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|r| r.owned_by(node))
            .map(|r| r.task.id)
            .collect();

        let mut requeued = 0;
        for id in orphaned {
            match self.release(id) {
                Transition::Retrying { retries } => {
                    requeued += 1;
                    self.log(format!(
                        "Requeued task {} from failed {}, retry {}/{}",
                        id, node, retries, MAX_RETRIES
                    ));
                }
                Transition::Failed => self.log(format!(
                    "Task {} failed after {} retries (lost on {})",
                    id, MAX_RETRIES, node
                )),
                _ => {}
            }
        }

        Some(requeued)
    }

    fn in_progress_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|r| matches!(r.status, TaskStatus::InProgress { .. }))
            .count()
    }

    fn summary(&self) -> Summary {
        let mut summary = Summary {
            completed: 0,
            failed: 0,
            total_retries: 0,
        };
        for r in self.tasks.values() {
            match r.status {
                TaskStatus::Completed { .. } => summary.completed += 1,
                TaskStatus::Failed => summary.failed += 1,
                _ => {}
            }
            summary.total_retries += r.retries;
        }
        summary
    }
}

impl StateStore {
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeName>,
    {
        let now = Instant::now();
        let nodes = nodes
            .into_iter()
            .map(|n| (n.into(), NodeMeta::new(now)))
            .collect();

        Self {
            inner: Mutex::new(Inner {
                accepting: true,
                next_id: 1,
                tasks: BTreeMap::new(),
                queue: TaskQueue::default(),
                nodes,
                events: Vec::new(),
            }),
            queue_ready: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wake(&self, n: usize) {
        for _ in 0..n {
            self.queue_ready.notify_one();
        }
    }

    /* ---------------- tareas ---------------- */

    /// Registra una tarea nueva como pendiente y la pone en cola.
    /// Los ids son estrictamente crecientes en orden de envío.
    pub fn submit(&self, payload: Payload) -> Result<TaskId, SubmitError> {
        let id = {
            let mut inner = self.lock();
            if !inner.accepting {
                return Err(SubmitError::ShuttingDown);
            }

            let id = inner.next_id;
            inner.next_id += 1;
            inner.tasks.insert(
                id,
                TaskRecord {
                    task: Task { id, payload },
                    status: TaskStatus::Pending,
                    retries: 0,
                    submitted_at: Utc::now(),
                },
            );
            inner.queue.enqueue(id);
            id
        };

        info!("tarea {} encolada", id);
        self.wake(1);
        Ok(id)
    }

    /// Saca la siguiente tarea de la cola y la asigna al nodo, en un paso.
    /// Un nodo muerto nunca reclama tareas.
    pub fn try_claim(&self, node: &str) -> Option<Task> {
        let mut inner = self.lock();

        let meta = inner.nodes.get(node)?;
        if !meta.alive {
            return None;
        }

        let id = inner.queue.dequeue()?;
        let record = inner.tasks.get_mut(&id)?;
        record.status = TaskStatus::InProgress {
            node: node.to_string(),
        };
        let task = record.task.clone();

        if let Some(meta) = inner.nodes.get_mut(node) {
            meta.tasks_started += 1;
        }
        inner.log(format!("{} received task {}: {}", node, task.id, task.payload));

        Some(task)
    }

    /// Publica el resultado de una tarea que el nodo tiene asignada.
    pub fn finish(&self, node: &str, id: TaskId, analysis: Analysis) -> Transition {
        let mut inner = self.lock();

        let Some(record) = inner.tasks.get_mut(&id) else {
            return Transition::Stale;
        };
        if !record.owned_by(node) {
            warn!("{} intentó completar la tarea {} que no tiene asignada", node, id);
            return Transition::Stale;
        }

        let rendered = analysis.to_string();
        record.status = TaskStatus::Completed { result: analysis };

        if let Some(meta) = inner.nodes.get_mut(node) {
            meta.tasks_succeeded += 1;
        }
        inner.log(format!("{} completed task {}: {}", node, id, rendered));

        Transition::Completed
    }

    /// Intento fallido en el nodo: reintento o fallo definitivo.
    pub fn fail(&self, node: &str, id: TaskId) -> Transition {
        let outcome = {
            let mut inner = self.lock();

            match inner.tasks.get(&id) {
                Some(record) if record.owned_by(node) => {}
                _ => {
                    warn!("{} reportó fallo de la tarea {} que no tiene asignada", node, id);
                    return Transition::Stale;
                }
            }

            if let Some(meta) = inner.nodes.get_mut(node) {
                meta.tasks_failed += 1;
            }

            let outcome = inner.release(id);
            match outcome {
                Transition::Retrying { retries } => inner.log(format!(
                    "{} failed task {}, retry {}/{}",
                    node, id, retries, MAX_RETRIES
                )),
                Transition::Failed => inner.log(format!(
                    "Task {} failed after {} retries",
                    id, MAX_RETRIES
                )),
                _ => {}
            }
            outcome
        };

        if matches!(outcome, Transition::Retrying { .. }) {
            self.wake(1);
        }
        outcome
    }

    /// Marca como fallidas las tareas que siguen en cola.
    /// Sólo tiene sentido cuando ya no queda ningún nodo vivo.
    pub fn abandon_queued(&self) -> usize {
        let mut inner = self.lock();
        let ids = inner.queue.drain();
        for id in &ids {
            if let Some(record) = inner.tasks.get_mut(id) {
                record.status = TaskStatus::Failed;
            }
            inner.log(format!("Task {} failed: no nodes available", id));
        }
        ids.len()
    }

    /* ---------------- nodos ---------------- */

    pub fn node_alive(&self, node: &str) -> bool {
        self.lock().nodes.get(node).map(|m| m.alive).unwrap_or(false)
    }

    /// Refresca el heartbeat si el nodo sigue vivo.
    pub fn beat(&self, node: &str) -> bool {
        let mut inner = self.lock();
        match inner.nodes.get_mut(node) {
            Some(meta) if meta.alive => {
                meta.last_heartbeat = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// Marca el nodo como muerto y reencola (o falla) sus tareas en curso,
    /// todo en una misma transición. Devuelve `false` si ya estaba muerto.
    pub fn mark_node_dead(&self, node: &str, cause: DeathCause) -> bool {
        let requeued = self.lock().kill(node, cause);
        match requeued {
            Some(n) => {
                self.wake(n);
                true
            }
            None => false,
        }
    }

    /// Marca como muertos los nodos vivos sin heartbeat en más de `stale_after`.
    pub fn reap_stale(&self, stale_after: Duration) -> Vec<NodeName> {
        let now = Instant::now();
        let mut inner = self.lock();

        let stale: Vec<NodeName> = inner
            .nodes
            .iter()
            .filter(|(_, m)| m.alive && now.saturating_duration_since(m.last_heartbeat) > stale_after)
            .map(|(name, _)| name.clone())
            .collect();

        let mut requeued = 0;
        for node in &stale {
            requeued += inner.kill(node, DeathCause::MissedHeartbeat).unwrap_or(0);
        }
        drop(inner);

        self.wake(requeued);
        stale
    }

    pub fn alive_nodes(&self) -> Vec<NodeName> {
        self.lock()
            .nodes
            .iter()
            .filter(|(_, m)| m.alive)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /* ---------------- ciclo de vida ---------------- */

    pub fn is_accepting(&self) -> bool {
        self.lock().accepting
    }

    pub fn stop_accepting(&self) {
        self.lock().accepting = false;
    }

    /// Cola vacía y nada en curso.
    pub fn is_quiescent(&self) -> bool {
        let inner = self.lock();
        inner.queue.is_empty() && inner.in_progress_count() == 0
    }

    /* ---------------- lecturas ---------------- */

    pub fn queue_depth(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn in_progress_count(&self) -> usize {
        self.lock().in_progress_count()
    }

    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.lock().tasks.get(&id).map(|r| r.status.clone())
    }

    pub fn retries(&self, id: TaskId) -> Option<u32> {
        self.lock().tasks.get(&id).map(|r| r.retries)
    }

    pub fn task_view(&self, id: TaskId) -> Option<TaskView> {
        self.lock().tasks.get(&id).map(TaskRecord::view)
    }

    /// Mapa tarea en curso -> nodo. Se deriva del estado, así que cada tarea
    /// tiene a lo sumo un nodo.
    pub fn assignments(&self) -> BTreeMap<TaskId, NodeName> {
        self.lock()
            .tasks
            .values()
            .filter_map(|r| match &r.status {
                TaskStatus::InProgress { node } => Some((r.task.id, node.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    pub fn log_event(&self, message: String) {
        self.lock().log(message);
    }

    pub fn summary(&self) -> Summary {
        self.lock().summary()
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        let now = Instant::now();
        let inner = self.lock();

        let mut active_by_node: HashMap<&str, u32> = HashMap::new();
        for r in inner.tasks.values() {
            if let TaskStatus::InProgress { node } = &r.status {
                *active_by_node.entry(node.as_str()).or_insert(0) += 1;
            }
        }

        let nodes: Vec<NodeView> = inner
            .nodes
            .iter()
            .map(|(name, meta)| NodeView {
                name: name.clone(),
                alive: meta.alive,
                last_heartbeat_ms_ago: now
                    .saturating_duration_since(meta.last_heartbeat)
                    .as_millis() as u64,
                active_tasks: active_by_node.get(name.as_str()).copied().unwrap_or(0),
                tasks_started: meta.tasks_started,
                tasks_succeeded: meta.tasks_succeeded,
                tasks_failed: meta.tasks_failed,
            })
            .collect();

        let summary = inner.summary();
        let total = inner.tasks.len();
        let progress_percent = if total > 0 {
            summary.completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        ClusterSnapshot {
            generated_at: Utc::now(),
            accepting: inner.accepting,
            alive_nodes: nodes.iter().filter(|n| n.alive).count(),
            nodes,
            queue_depth: inner.queue.len(),
            in_progress_count: inner.in_progress_count(),
            tasks: inner.tasks.values().map(TaskRecord::view).collect(),
            progress_percent,
            events: inner.events.clone(),
        }
    }
}

#[async_trait]
impl Coordinator for StateStore {
    fn is_alive(&self, node: &str) -> bool {
        self.node_alive(node)
    }

    fn heartbeat(&self, node: &str) -> bool {
        self.beat(node)
    }

    async fn next_task(&self, node: &str, wait: Duration) -> Option<Task> {
        let deadline = Instant::now() + wait;
        loop {
            // registrarse antes de mirar la cola para no perder un aviso
            let notified = self.queue_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(task) = self.try_claim(node) {
                return Some(task);
            }
            if !self.node_alive(node) {
                return None;
            }
            if timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    fn complete_task(&self, node: &str, task_id: TaskId, analysis: Analysis) -> Transition {
        self.finish(node, task_id, analysis)
    }

    fn fail_attempt(&self, node: &str, task_id: TaskId) -> Transition {
        self.fail(node, task_id)
    }

    fn record_event(&self, message: String) {
        self.log_event(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::analyze;

    fn store() -> StateStore {
        StateStore::new(["Node1", "Node2", "Node3"])
    }

    fn payload(values: &[f64]) -> Payload {
        Payload::new(values.to_vec()).unwrap()
    }

    #[test]
    fn ids_crecientes_y_tarea_pendiente() {
        let s = store();
        let a = s.submit(payload(&[1.0])).unwrap();
        let b = s.submit(payload(&[2.0])).unwrap();
        assert!(b > a);
        assert_eq!(s.status(a), Some(TaskStatus::Pending));
        assert_eq!(s.retries(a), Some(0));
        assert_eq!(s.queue_depth(), 2);
    }

    #[test]
    fn reclamar_saca_de_la_cola_y_asigna() {
        let s = store();
        let id = s.submit(payload(&[1.0, 2.0])).unwrap();

        let task = s.try_claim("Node1").unwrap();
        assert_eq!(task.id, id);
        assert_eq!(s.queue_depth(), 0);
        assert_eq!(s.assignments().get(&id), Some(&"Node1".to_string()));
        assert_eq!(
            s.status(id),
            Some(TaskStatus::InProgress { node: "Node1".into() })
        );
        assert!(s.try_claim("Node2").is_none());
    }

    #[test]
    fn completar_libera_la_asignacion() {
        let s = store();
        let id = s.submit(payload(&[5.0])).unwrap();
        let task = s.try_claim("Node1").unwrap();

        let t = s.finish("Node1", id, analyze(&task.payload));
        assert_eq!(t, Transition::Completed);
        assert!(s.assignments().is_empty());
        assert!(matches!(s.status(id), Some(TaskStatus::Completed { .. })));
        assert_eq!(s.summary().completed, 1);
        assert!(s.is_quiescent());
    }

    #[test]
    fn fallos_reencolan_hasta_agotar_reintentos() {
        let s = store();
        let id = s.submit(payload(&[1.0])).unwrap();

        for expected in 1..=MAX_RETRIES {
            s.try_claim("Node1").unwrap();
            assert_eq!(s.fail("Node1", id), Transition::Retrying { retries: expected });
            assert_eq!(s.status(id), Some(TaskStatus::Retrying { retries: expected }));
            assert_eq!(s.queue_depth(), 1);
        }

        // cuarto fallo: definitivo
        s.try_claim("Node1").unwrap();
        assert_eq!(s.fail("Node1", id), Transition::Failed);
        assert_eq!(s.status(id), Some(TaskStatus::Failed));
        assert_eq!(s.retries(id), Some(MAX_RETRIES));
        assert_eq!(s.queue_depth(), 0);
        assert!(s.assignments().is_empty());
        assert!(s.events().contains(&"Task 1 failed after 3 retries".to_string()));
    }

    #[test]
    fn nodo_muerto_reencola_sus_tareas_con_un_reintento_mas() {
        let s = store();
        let id = s.submit(payload(&[1.0, 2.0, 3.0])).unwrap();
        s.try_claim("Node2").unwrap();

        assert!(s.mark_node_dead("Node2", DeathCause::Injected));
        assert_eq!(s.retries(id), Some(1));
        assert_eq!(s.status(id), Some(TaskStatus::Retrying { retries: 1 }));
        assert_eq!(s.queue_depth(), 1);
        assert!(s.assignments().is_empty());

        // ya muerto: no se vuelve a procesar
        assert!(!s.mark_node_dead("Node2", DeathCause::MissedHeartbeat));
        assert!(s.try_claim("Node2").is_none());
        assert_eq!(s.alive_nodes(), vec!["Node1".to_string(), "Node3".to_string()]);

        // reencolada desde el payload original
        let again = s.try_claim("Node1").unwrap();
        assert_eq!(again.payload.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn nodo_muerto_con_tarea_sin_reintentos_la_falla() {
        let s = store();
        let id = s.submit(payload(&[1.0])).unwrap();
        for _ in 0..MAX_RETRIES {
            s.try_claim("Node1").unwrap();
            s.fail("Node1", id);
        }
        s.try_claim("Node3").unwrap();

        s.mark_node_dead("Node3", DeathCause::MissedHeartbeat);
        assert_eq!(s.status(id), Some(TaskStatus::Failed));
        assert_eq!(s.retries(id), Some(MAX_RETRIES));
        assert!(s.is_quiescent());
    }

    #[test]
    fn resultado_de_nodo_que_perdio_la_tarea_se_descarta() {
        let s = store();
        let id = s.submit(payload(&[4.0])).unwrap();
        let task = s.try_claim("Node1").unwrap();
        s.mark_node_dead("Node1", DeathCause::Injected);
        let again = s.try_claim("Node2").unwrap();
        assert_eq!(again.id, id);

        assert_eq!(s.finish("Node1", id, analyze(&task.payload)), Transition::Stale);
        assert_eq!(s.fail("Node1", id), Transition::Stale);
        assert_eq!(s.assignments().get(&id), Some(&"Node2".to_string()));
        assert_eq!(s.retries(id), Some(1));
    }

    #[test]
    fn no_acepta_tareas_al_cerrar() {
        let s = store();
        s.stop_accepting();
        assert_eq!(s.submit(payload(&[1.0])), Err(SubmitError::ShuttingDown));
    }

    #[test]
    fn abandonar_cola_falla_lo_pendiente() {
        let s = store();
        s.submit(payload(&[1.0])).unwrap();
        s.submit(payload(&[2.0])).unwrap();
        assert_eq!(s.abandon_queued(), 2);
        assert_eq!(s.summary().failed, 2);
        assert!(s.is_quiescent());
    }

    #[test]
    fn snapshot_refleja_progreso_y_nodos() {
        let s = store();
        let a = s.submit(payload(&[1.0])).unwrap();
        s.submit(payload(&[2.0])).unwrap();
        let task = s.try_claim("Node1").unwrap();
        s.finish("Node1", a, analyze(&task.payload));
        s.try_claim("Node2").unwrap();

        let snap = s.snapshot();
        assert_eq!(snap.progress_percent, 50.0);
        assert_eq!(snap.queue_depth, 0);
        assert_eq!(snap.in_progress_count, 1);
        assert_eq!(snap.alive_nodes, 3);
        assert_eq!(snap.tasks.len(), 2);
        assert_eq!(
            snap.tasks[0].result.as_deref(),
            Some("No Outliers - High Avg: 1.00, Low Avg: 1.00")
        );
        let node2 = snap.nodes.iter().find(|n| n.name == "Node2").unwrap();
        assert_eq!(node2.active_tasks, 1);
        assert_eq!(snap.events[0], "Node1 received task 1: [1.0]");
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_viejo_marca_nodo_muerto() {
        let s = store();
        let id = s.submit(payload(&[1.0])).unwrap();
        s.try_claim("Node1").unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        s.beat("Node2");
        s.beat("Node3");
        tokio::time::sleep(Duration::from_millis(1000)).await;

        // Node1 lleva 2.5s sin latir, los otros 1s
        let dead = s.reap_stale(Duration::from_secs(2));
        assert_eq!(dead, vec!["Node1".to_string()]);
        assert!(!s.node_alive("Node1"));
        assert!(!s.beat("Node1"));
        assert_eq!(s.retries(id), Some(1));
        assert!(s
            .events()
            .contains(&"Scheduler detected Node1 failed (no heartbeat)".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn next_task_espera_hasta_que_llega_trabajo() {
        let s = std::sync::Arc::new(store());
        let waiter = {
            let s = s.clone();
            tokio::spawn(async move { s.next_task("Node1", Duration::from_secs(1)).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        let id = s.submit(payload(&[7.0])).unwrap();

        let task = waiter.await.unwrap().unwrap();
        assert_eq!(task.id, id);
    }

    #[tokio::test(start_paused = true)]
    async fn next_task_devuelve_none_al_vencer() {
        let s = store();
        assert!(s.next_task("Node1", Duration::from_millis(100)).await.is_none());
    }
}
