//! # Pool de Threads
//! src/dispatch/pool.rs
//!
//! N workers fijos sacando tareas de una `BoundedQueue` de capacidad N.
//! Con todos los workers ocupados y la cola llena, `add_task` bloquea y
//! el accept loop deja de aceptar: la conexión espera en el backlog del
//! kernel en lugar de descartarse.

use super::queue::BoundedQueue;
use super::Dispatcher;
use crate::server::connection::{panic_message, Connection, ConnectionService};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Unidad de trabajo del pool
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// El pool ya no acepta tareas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolClosed;

impl std::fmt::Display for PoolClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "thread pool is shut down")
    }
}

impl std::error::Error for PoolClosed {}

/// Pool de threads con cola acotada
pub struct ThreadPool {
    queue: BoundedQueue<Task>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Arranca `size` workers y una cola de la misma capacidad
    pub fn new(size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let queue = BoundedQueue::new(size);
        let mut pool = Self {
            queue,
            workers: Vec::with_capacity(size),
        };

        for i in 0..size {
            let name = format!("pool-worker-{}", i);
            let queue = pool.queue.clone();
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(name, queue))?;
            pool.workers.push(handle);
        }

        info!(workers = size, "thread pool started");
        Ok(pool)
    }

    /// Encola una tarea; bloquea si la cola está llena
    pub fn add_task<F>(&self, task: F) -> Result<(), PoolClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Box::new(task)).map_err(|_| PoolClosed)
    }

    /// Espera a que todas las tareas encoladas hayan terminado
    pub fn wait_completion(&self) {
        self.queue.join();
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Termina lo pendiente, cierra la cola y junta los workers
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.wait_completion();
        self.queue.close();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread exited abnormally");
            }
        }
        debug!("thread pool stopped");
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Loop de cada worker
///
/// Un panic en una tarea se loguea y el worker sigue vivo; la tarea se
/// marca como terminada igual para no trabar `wait_completion`.
fn worker_loop(name: String, queue: BoundedQueue<Task>) {
    debug!(worker = %name, "worker started");

    while let Some(task) = queue.pop() {
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(task)) {
            error!(worker = %name, "task panicked: {}", panic_message(&panic));
        }
        queue.task_done();
    }

    debug!(worker = %name, "worker stopped");
}

/// Dispatcher que atiende cada conexión en el pool
pub struct PoolDispatcher {
    pool: ThreadPool,
    service: ConnectionService,
}

impl PoolDispatcher {
    pub fn new(workers: usize, service: ConnectionService) -> io::Result<Self> {
        Ok(Self {
            pool: ThreadPool::new(workers)?,
            service,
        })
    }
}

impl Dispatcher for PoolDispatcher {
    fn dispatch(&self, conn: Connection) {
        let service = self.service.clone();
        let peer = conn.peer;
        if self.pool.add_task(move || service.serve(conn)).is_err() {
            error!(%peer, "pool is closed, dropping connection");
        }
    }

    fn drain(&mut self) {
        self.pool.shutdown();
    }

    fn name(&self) -> &'static str {
        "pool"
    }
}
