//! # Apagado Cooperativo
//! src/server/shutdown.rs
//!
//! El accept loop consulta `is_requested()` en cada vuelta. Quien pidió
//! el apagado puede esperar con `wait_stopped()` a que el servidor haya
//! terminado de drenar y cerrado sus sockets.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Token de cancelación con señal de finalización
#[derive(Clone, Default)]
pub struct ShutdownToken {
    requested: Arc<AtomicBool>,
    stopped: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pide que el servidor deje de aceptar conexiones
    ///
    /// Es idempotente y se puede llamar desde cualquier thread.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Flag compartido, para registrarlo en un handler de señales
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.requested)
    }

    /// SIGINT y SIGTERM piden el apagado
    ///
    /// Solo hace falta en el proceso principal: cada réplica registra
    /// SIGTERM por su cuenta al nacer.
    pub fn register_signals(&self) -> io::Result<()> {
        for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
            signal_hook::flag::register(signal, self.flag())?;
        }
        Ok(())
    }

    /// Pide el apagado y bloquea hasta que el servidor terminó
    pub fn shutdown(&self) {
        self.request();
        self.wait_stopped();
    }

    /// Lo llama el servidor una vez drenado y cerrado
    pub fn mark_stopped(&self) {
        let (lock, cvar) = &*self.stopped;
        let mut stopped = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *stopped = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.stopped;
        *lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn wait_stopped(&self) {
        let (lock, cvar) = &*self.stopped;
        let mut stopped = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while !*stopped {
            stopped = cvar.wait(stopped).unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Como `wait_stopped`, con límite. Devuelve `true` si terminó.
    pub fn wait_stopped_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.stopped;
        let stopped = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (stopped, _) = cvar
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *stopped
    }
}

/// Marca el token como detenido al salir del scope, aun con panic
pub struct StoppedGuard(pub ShutdownToken);

impl Drop for StoppedGuard {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_request_is_shared_between_clones() {
        let token = ShutdownToken::new();
        let clone = token.clone();

        assert!(!clone.is_requested());
        token.request();
        assert!(clone.is_requested());

        token.request();
        assert!(clone.is_requested());
    }

    #[test]
    fn test_flag_is_the_same_atomic() {
        let token = ShutdownToken::new();
        token.flag().store(true, Ordering::SeqCst);
        assert!(token.is_requested());
    }

    #[test]
    fn test_shutdown_waits_for_stop() {
        let token = ShutdownToken::new();
        let server_side = token.clone();

        let server = thread::spawn(move || {
            while !server_side.is_requested() {
                thread::sleep(Duration::from_millis(10));
            }
            let _guard = StoppedGuard(server_side);
        });

        token.shutdown();
        assert!(token.is_stopped());
        server.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_without_stop() {
        let token = ShutdownToken::new();
        assert!(!token.wait_stopped_timeout(Duration::from_millis(50)));

        token.mark_stopped();
        assert!(token.wait_stopped_timeout(Duration::from_millis(50)));
    }

    #[test]
    fn test_guard_marks_on_panic() {
        let token = ShutdownToken::new();
        let inner = token.clone();

        let result = thread::spawn(move || {
            let _guard = StoppedGuard(inner);
            panic!("server crashed");
        })
        .join();

        assert!(result.is_err());
        assert!(token.is_stopped());
    }
}
