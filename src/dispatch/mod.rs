//! # Dispatchers
//! src/dispatch/mod.rs
//!
//! Estrategias para atender las conexiones que entrega el accept loop:
//!
//! - `pool`: N threads fijos y una cola acotada de capacidad N
//! - `thread`: un thread nuevo por conexión
//! - `event-loop`: atiende en el mismo thread, con réplicas por fork
//!
//! Las tres comparten el mismo handler y la misma frontera de errores
//! (`ConnectionService::serve`).

pub mod event_loop;
pub mod pool;
pub mod queue;
pub mod threaded;

pub use event_loop::{InlineDispatcher, ReplicaSet};
pub use pool::{PoolDispatcher, ThreadPool};
pub use queue::BoundedQueue;
pub use threaded::ThreadPerConnection;

use crate::server::connection::Connection;
use clap::ValueEnum;
use std::fmt;

/// Estrategia de concurrencia
pub trait Dispatcher {
    /// Entrega una conexión aceptada
    ///
    /// Puede bloquear (pool saturado) o atenderla en el momento
    /// (event loop). Nunca devuelve error: las fallas se loguean.
    fn dispatch(&self, conn: Connection);

    /// Espera a que termine todo lo entregado. Se llama una vez, al apagar.
    fn drain(&mut self);

    fn name(&self) -> &'static str;
}

/// Modo de dispatch elegido en la configuración
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DispatchMode {
    /// Pool de threads acotado
    Pool,
    /// Thread por conexión
    Thread,
    /// Loop de readiness con réplicas por fork
    EventLoop,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchMode::Pool => "pool",
            DispatchMode::Thread => "thread",
            DispatchMode::EventLoop => "event-loop",
        };
        write!(f, "{}", name)
    }
}
