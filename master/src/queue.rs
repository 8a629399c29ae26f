use common::TaskId;
use std::collections::VecDeque;

/// Cola FIFO de tareas pendientes.
///
/// Guarda sólo ids: el payload vive en el registro de la tarea, así una tarea
/// reencolada vuelve siempre con su payload original. Las reencoladas entran
/// por el final, por lo que el orden global es FIFO aproximado.
#[derive(Debug, Default)]
pub struct TaskQueue {
    items: VecDeque<TaskId>,
}

impl TaskQueue {
    pub fn enqueue(&mut self, id: TaskId) {
        self.items.push_back(id);
    }

    pub fn dequeue(&mut self) -> Option<TaskId> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Vacía la cola devolviendo los ids en orden.
    pub fn drain(&mut self) -> Vec<TaskId> {
        self.items.drain(..).collect()
    }
}
