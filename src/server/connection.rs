//! # Frontera de Dispatch
//! src/server/connection.rs
//!
//! `ConnectionService::serve` es lo único que llaman los dispatchers.
//! Pase lo que pase dentro del handler (error de I/O, timeout o panic),
//! acá se registra, se loguea y el socket se cierra.

use crate::files::PathResolver;
use crate::metrics::ServerStats;
use crate::server::handler::{ConnectionHandler, Outcome};
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Conexión aceptada, todavía sin atender
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }
}

/// Estado compartido para atender conexiones
///
/// Solo tiene datos de lectura y contadores, así que se clona a cada
/// worker o thread.
#[derive(Clone)]
pub struct ConnectionService {
    resolver: Arc<PathResolver>,
    timeout: Option<Duration>,
    stats: ServerStats,
}

impl ConnectionService {
    pub fn new(resolver: PathResolver, timeout: Option<Duration>, stats: ServerStats) -> Self {
        Self {
            resolver: Arc::new(resolver),
            timeout,
            stats,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Atiende la conexión y la cierra
    ///
    /// Nunca propaga errores ni panics al dispatcher.
    pub fn serve(&self, conn: Connection) {
        let Connection { stream, peer } = conn;
        let started = Instant::now();
        self.stats.connection_opened();

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.handle(&stream)));

        match result {
            Ok(Ok(Outcome::Responded(status))) => {
                debug!(%peer, status = status.as_u16(), "response sent");
                self.stats.record_status(status);
            }
            Ok(Ok(Outcome::Closed)) => {
                debug!(%peer, "empty request, closing");
                self.stats.record_silent_close();
            }
            Ok(Ok(Outcome::TimedOut)) => {
                debug!(%peer, "connection timed out");
                self.stats.record_timeout();
            }
            Ok(Err(e)) => {
                error!(%peer, "error handling connection: {:#}", e);
                self.stats.record_failure();
            }
            Err(panic) => {
                error!(%peer, "handler panicked: {}", panic_message(&panic));
                self.stats.record_failure();
            }
        }

        // El peer puede haber cerrado antes; solo importa liberar el socket
        if let Err(e) = stream.shutdown(Shutdown::Both) {
            if e.kind() != std::io::ErrorKind::NotConnected {
                warn!(%peer, "shutdown failed: {}", e);
            }
        }
        self.stats.connection_closed(started.elapsed());
    }

    fn handle(&self, stream: &TcpStream) -> anyhow::Result<Outcome> {
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;

        let handler = ConnectionHandler::new(Arc::clone(&self.resolver), BufReader::new(stream), stream);
        handler.handle()
    }
}

/// Texto de un panic para el log
pub fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, peer) = listener.accept().unwrap();
        (Connection::new(stream, peer), client)
    }

    fn service(root: &std::path::Path, timeout: Option<Duration>) -> ConnectionService {
        ConnectionService::new(PathResolver::new(root), timeout, ServerStats::new())
    }

    #[test]
    fn test_serve_writes_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"abc").unwrap();
        let service = service(dir.path(), Some(Duration::from_secs(5)));
        let (conn, mut client) = pair();

        client.write_all(b"GET /a.txt HTTP/1.1\r\n\r\n").unwrap();
        let worker = {
            let service = service.clone();
            thread::spawn(move || service.serve(conn))
        };

        let mut response = Vec::new();
        client.read_to_end(&mut response).unwrap();
        worker.join().unwrap();

        assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with(b"\r\n\r\nabc"));

        let snapshot = service.stats().snapshot();
        assert_eq!(snapshot.status_codes.get(&200), Some(&1));
        assert_eq!(snapshot.in_flight, 0);
    }

    #[test]
    fn test_client_closing_early_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Some(Duration::from_secs(5)));
        let (conn, client) = pair();

        drop(client);
        service.serve(conn);

        let snapshot = service.stats().snapshot();
        assert_eq!(snapshot.closed_silently, 1);
        assert_eq!(snapshot.responses, 0);
        assert_eq!(snapshot.failures, 0);
    }

    #[test]
    fn test_idle_client_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Some(Duration::from_millis(100)));
        let (conn, mut client) = pair();

        service.serve(conn);

        let mut response = Vec::new();
        client.read_to_end(&mut response).unwrap();
        assert!(response.is_empty());
        assert_eq!(service.stats().snapshot().timeouts, 1);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&boxed), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&boxed), "bang");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&boxed), "unknown panic");
    }
}
