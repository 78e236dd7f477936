//! # Cola Acotada
//! src/dispatch/queue.rs
//!
//! Cola FIFO thread-safe con capacidad fija. `push` bloquea cuando está
//! llena, que es lo que le da backpressure al accept loop.
//!
//! Además lleva la cuenta de tareas sin terminar: `task_done()` la baja
//! y `join()` espera a que llegue a cero.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

struct QueueState<T> {
    items: VecDeque<T>,

    /// Encoladas y todavía no marcadas con `task_done`
    unfinished: usize,

    closed: bool,
}

/// Cola acotada compartida entre productor y workers
pub struct BoundedQueue<T> {
    state: Arc<Mutex<QueueState<T>>>,

    /// Avisa a los workers que hay items (o que se cerró)
    not_empty: Arc<Condvar>,

    /// Avisa al productor que se liberó lugar
    not_full: Arc<Condvar>,

    /// Avisa a `join()` que no quedan tareas pendientes
    all_done: Arc<Condvar>,

    capacity: usize,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            not_empty: Arc::clone(&self.not_empty),
            not_full: Arc::clone(&self.not_full),
            all_done: Arc::clone(&self.all_done),
            capacity: self.capacity,
        }
    }
}

impl<T> BoundedQueue<T> {
    /// Crea una cola con lugar para `capacity` items (mínimo 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.max(1)),
                unfinished: 0,
                closed: false,
            })),
            not_empty: Arc::new(Condvar::new()),
            not_full: Arc::new(Condvar::new()),
            all_done: Arc::new(Condvar::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Encola un item, bloqueando mientras la cola esté llena
    ///
    /// Si la cola se cerró devuelve el item en `Err`.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        while state.items.len() >= self.capacity && !state.closed {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        if state.closed {
            return Err(item);
        }

        state.items.push_back(item);
        state.unfinished += 1;
        self.not_empty.notify_one();
        Ok(())
    }

    /// Desencola el item más viejo, bloqueando mientras esté vacía
    ///
    /// Devuelve `None` cuando la cola está cerrada y vacía.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Marca como terminada una tarea obtenida con `pop`
    pub fn task_done(&self) {
        let mut state = self.lock();
        state.unfinished = state.unfinished.saturating_sub(1);
        if state.unfinished == 0 {
            self.all_done.notify_all();
        }
    }

    /// Bloquea hasta que todas las tareas encoladas estén terminadas
    pub fn join(&self) {
        let mut state = self.lock();
        while state.unfinished > 0 {
            state = self
                .all_done
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Rechaza nuevos items y despierta a todos los que esperan
    ///
    /// Los items ya encolados se siguen entregando con `pop`.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tareas encoladas o en ejecución
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }
}
