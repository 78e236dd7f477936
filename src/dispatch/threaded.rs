//! # Thread por Conexión
//! src/dispatch/threaded.rs
//!
//! Cada conexión aceptada corre en su propio thread. No hay límite de
//! concurrencia; el único estado es un contador de conexiones en curso
//! para poder drenarlas al apagar.

use super::Dispatcher;
use crate::server::connection::{Connection, ConnectionService};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use tracing::{debug, error};

/// Conexiones en curso, con espera hasta que no quede ninguna
#[derive(Default)]
pub struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registra una conexión; se descuenta al soltar el guard
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.lock() += 1;
        InFlightGuard(Arc::clone(self))
    }

    pub fn count(&self) -> usize {
        *self.lock()
    }

    /// Bloquea hasta que no haya conexiones en curso
    pub fn wait_idle(&self) {
        let mut count = self.lock();
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

pub struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.0.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Dispatcher de un thread por conexión
pub struct ThreadPerConnection {
    service: ConnectionService,
    in_flight: Arc<InFlight>,
}

impl ThreadPerConnection {
    pub fn new(service: ConnectionService) -> Self {
        Self {
            service,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }
}

impl Dispatcher for ThreadPerConnection {
    fn dispatch(&self, conn: Connection) {
        let service = self.service.clone();
        let guard = self.in_flight.enter();
        let peer = conn.peer;

        let spawned = thread::Builder::new()
            .name(format!("conn-{}", peer))
            .spawn(move || {
                let _guard = guard;
                service.serve(conn);
            });

        // Si no se pudo crear el thread, la closure (con la conexión y el
        // guard) ya se soltó y el socket quedó cerrado
        if let Err(e) = spawned {
            error!(%peer, "could not spawn connection thread: {}", e);
        }
    }

    fn drain(&mut self) {
        debug!(in_flight = self.in_flight(), "waiting for connection threads");
        self.in_flight.wait_idle();
    }

    fn name(&self) -> &'static str {
        "thread"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_in_flight_counts_guards() {
        let in_flight = Arc::new(InFlight::default());

        let a = in_flight.enter();
        let b = in_flight.enter();
        assert_eq!(in_flight.count(), 2);

        drop(a);
        assert_eq!(in_flight.count(), 1);
        drop(b);
        assert_eq!(in_flight.count(), 0);
    }

    #[test]
    fn test_wait_idle_blocks_until_guards_drop() {
        let in_flight = Arc::new(InFlight::default());
        let guard = in_flight.enter();

        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            drop(guard);
        });

        let start = Instant::now();
        in_flight.wait_idle();
        assert!(start.elapsed() >= Duration::from_millis(150));
        assert_eq!(in_flight.count(), 0);
        worker.join().unwrap();
    }

    #[test]
    fn test_guard_released_on_panic() {
        let in_flight = Arc::new(InFlight::default());
        let guard = in_flight.enter();

        let result = thread::spawn(move || {
            let _guard = guard;
            panic!("connection thread crashed");
        })
        .join();

        assert!(result.is_err());
        in_flight.wait_idle();
    }
}
