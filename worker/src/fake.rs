//! Coordinator en memoria para los tests del crate.

use async_trait::async_trait;
use common::{Analysis, Coordinator, Payload, Task, TaskId, Transition};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

#[derive(Default)]
struct FakeState {
    alive: HashMap<String, bool>,
    heartbeats: HashMap<String, u32>,
    queue: VecDeque<Task>,
    held: HashMap<TaskId, Task>,
    completed: Vec<(TaskId, Analysis)>,
    failures: Vec<TaskId>,
    events: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeCoordinator {
    state: Mutex<FakeState>,
}

impl FakeCoordinator {
    pub(crate) fn with_tasks(nodes: &[&str], payloads: &[&[f64]]) -> Arc<Self> {
        let fake = Self::default();
        {
            let mut st = fake.state.lock().unwrap();
            for n in nodes {
                st.alive.insert(n.to_string(), true);
            }
            for (i, values) in payloads.iter().enumerate() {
                st.queue.push_back(Task {
                    id: i as TaskId + 1,
                    payload: Payload::new(values.to_vec()).unwrap(),
                });
            }
        }
        Arc::new(fake)
    }

    pub(crate) fn kill(&self, node: &str) {
        self.state.lock().unwrap().alive.insert(node.to_string(), false);
    }

    pub(crate) fn heartbeats(&self, node: &str) -> u32 {
        self.state.lock().unwrap().heartbeats.get(node).copied().unwrap_or(0)
    }

    pub(crate) fn completed(&self) -> Vec<(TaskId, Analysis)> {
        self.state.lock().unwrap().completed.clone()
    }

    pub(crate) fn failures(&self) -> Vec<TaskId> {
        self.state.lock().unwrap().failures.clone()
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub(crate) fn pending(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }
}

#[async_trait]
impl Coordinator for FakeCoordinator {
    fn is_alive(&self, node: &str) -> bool {
        self.state.lock().unwrap().alive.get(node).copied().unwrap_or(false)
    }

    fn heartbeat(&self, node: &str) -> bool {
        let mut st = self.state.lock().unwrap();
        if !st.alive.get(node).copied().unwrap_or(false) {
            return false;
        }
        *st.heartbeats.entry(node.to_string()).or_insert(0) += 1;
        true
    }

    async fn next_task(&self, _node: &str, wait: Duration) -> Option<Task> {
        let task = {
            let mut st = self.state.lock().unwrap();
            let task = st.queue.pop_front();
            if let Some(t) = &task {
                st.held.insert(t.id, t.clone());
            }
            task
        };
        if task.is_none() {
            tokio::time::sleep(wait).await;
        }
        task
    }

    fn complete_task(&self, _node: &str, task_id: TaskId, analysis: Analysis) -> Transition {
        let mut st = self.state.lock().unwrap();
        match st.held.remove(&task_id) {
            Some(_) => {
                st.completed.push((task_id, analysis));
                Transition::Completed
            }
            None => Transition::Stale,
        }
    }

    fn fail_attempt(&self, _node: &str, task_id: TaskId) -> Transition {
        let mut st = self.state.lock().unwrap();
        st.failures.push(task_id);
        let retries = st.failures.iter().filter(|id| **id == task_id).count() as u32;
        match st.held.remove(&task_id) {
            Some(task) => {
                st.queue.push_back(task);
                Transition::Retrying { retries }
            }
            None => Transition::Stale,
        }
    }

    fn record_event(&self, message: String) {
        self.state.lock().unwrap().events.push(message);
    }
}
