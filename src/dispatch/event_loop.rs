//! # Event Loop con Réplicas
//! src/dispatch/event_loop.rs
//!
//! Cada proceso corre un único loop de readiness y atiende la conexión
//! en el mismo thread que la aceptó. Para usar varios cores se crean
//! réplicas con `fork(2)` que heredan el listener y compiten por
//! `accept`.
//!
//! El proceso padre también atiende; al apagar manda SIGTERM a cada
//! réplica y espera su salida con `waitpid(2)`. Cada réplica registra
//! SIGTERM sobre su propio flag de cancelación, así que termina la
//! conexión en curso antes de salir.

use super::Dispatcher;
use crate::server::connection::{Connection, ConnectionService};
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Atiende la conexión en el thread del loop
pub struct InlineDispatcher {
    service: ConnectionService,
}

impl InlineDispatcher {
    pub fn new(service: ConnectionService) -> Self {
        Self { service }
    }
}

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, conn: Connection) {
        self.service.serve(conn);
    }

    /// Nada que esperar: `dispatch` vuelve con la conexión ya cerrada
    fn drain(&mut self) {}

    fn name(&self) -> &'static str {
        "event-loop"
    }
}

/// Procesos réplica creados con fork
#[derive(Debug, Default)]
pub struct ReplicaSet {
    pids: Vec<libc::pid_t>,
}

impl ReplicaSet {
    /// Crea `count` réplicas que ejecutan `child_main`
    ///
    /// En cada hijo, SIGTERM queda registrado sobre `cancel` antes de
    /// llamar a `child_main`, que debe consultarlo para salir. Su valor
    /// de retorno es el exit code; el hijo nunca vuelve de esta función.
    /// Si un fork falla, las réplicas ya creadas se terminan.
    ///
    /// El hijo solo conserva el thread que hizo el fork, así que
    /// `child_main` no puede depender de otros threads del padre.
    pub fn spawn<F>(count: usize, cancel: &Arc<AtomicBool>, mut child_main: F) -> io::Result<Self>
    where
        F: FnMut() -> i32,
    {
        let mut set = Self::default();

        for _ in 0..count {
            match unsafe { libc::fork() } {
                -1 => {
                    let err = io::Error::last_os_error();
                    set.terminate();
                    return Err(err);
                }
                0 => {
                    // La copia del flag es propia del hijo: solo SIGTERM la levanta
                    let sigterm = signal_hook::consts::SIGTERM;
                    let code = match signal_hook::flag::register(sigterm, Arc::clone(cancel)) {
                        Ok(_) => child_main(),
                        Err(e) => {
                            error!("replica could not register SIGTERM: {}", e);
                            1
                        }
                    };
                    // Sin atexit ni destructores: son estado copiado del padre
                    unsafe { libc::_exit(code) }
                }
                pid => {
                    debug!(pid, "replica started");
                    set.pids.push(pid);
                }
            }
        }

        if count > 0 {
            info!(replicas = count, pids = ?set.pids, "replica processes started");
        }
        Ok(set)
    }

    pub fn pids(&self) -> &[libc::pid_t] {
        &self.pids
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    /// SIGTERM a todas las réplicas y espera a que terminen
    ///
    /// Devuelve cuántas salieron con status 0.
    pub fn terminate(&mut self) -> usize {
        for &pid in &self.pids {
            if unsafe { libc::kill(pid, libc::SIGTERM) } == -1 {
                let err = io::Error::last_os_error();
                // ESRCH: ya no existe
                if err.raw_os_error() != Some(libc::ESRCH) {
                    warn!(pid, "could not signal replica: {}", err);
                }
            }
        }

        let mut clean = 0;
        for pid in self.pids.drain(..) {
            match reap(pid) {
                Ok(status) if libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0 => {
                    debug!(pid, "replica exited cleanly");
                    clean += 1;
                }
                Ok(status) => warn!(pid, status, "replica did not exit cleanly"),
                Err(e) => warn!(pid, "could not reap replica: {}", e),
            }
        }
        clean
    }
}

impl Drop for ReplicaSet {
    fn drop(&mut self) {
        if !self.pids.is_empty() {
            self.terminate();
        }
    }
}

/// `waitpid` bloqueante, reintentando si lo interrumpe una señal
fn reap(pid: libc::pid_t) -> io::Result<libc::c_int> {
    let mut status: libc::c_int = 0;
    loop {
        if unsafe { libc::waitpid(pid, &mut status, 0) } != -1 {
            return Ok(status);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[test]
    fn test_zero_replicas() {
        let cancel = Arc::new(AtomicBool::new(false));
        let set = ReplicaSet::spawn(0, &cancel, || 0).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_replicas_are_terminated_and_reaped() {
        // Los hijos esperan su flag; sin el registro SIGTERM los mataría
        let cancel = Arc::new(AtomicBool::new(false));
        let mut set = ReplicaSet::spawn(2, &cancel, || {
            while !cancel.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(10));
            }
            0
        })
        .unwrap();
        assert_eq!(set.len(), 2);
        let pids = set.pids().to_vec();

        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(set.terminate(), 2);
        assert!(set.is_empty());
        // SIGTERM no toca el flag del padre
        assert!(!cancel.load(Ordering::SeqCst));

        // Ya reapeados: waitpid falla con ECHILD
        for pid in pids {
            let mut status = 0;
            assert_eq!(unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) }, -1);
        }
    }

    #[test]
    fn test_terminate_after_child_exited() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut set = ReplicaSet::spawn(1, &cancel, || 3).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(set.terminate(), 0);
        assert!(set.is_empty());
    }
}
