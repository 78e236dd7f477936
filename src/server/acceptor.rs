//! # Accept Loop
//! src/server/acceptor.rs
//!
//! El listener es no bloqueante. Se espera con `poll(2)` hasta que esté
//! listo o venza el intervalo, y recién ahí se llama a `accept`. Así el
//! loop revisa el pedido de apagado al menos una vez por intervalo.
//!
//! Cuando varios procesos comparten el listener todos despiertan con la
//! misma conexión; los que pierden la carrera reciben `WouldBlock`.

use crate::dispatch::Dispatcher;
use crate::metrics::ServerStats;
use crate::server::connection::Connection;
use crate::server::shutdown::ShutdownToken;
use std::io;
use std::net::TcpListener;
use std::os::unix::io::{AsRawFd, RawFd};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Pausa después de un error de `accept` (por ejemplo `EMFILE`)
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Acepta conexiones hasta que se pida el apagado
///
/// Cada conexión se cuenta en `stats` y se entrega al dispatcher; si el
/// dispatcher bloquea (pool lleno), el loop deja de aceptar mientras tanto.
pub fn accept_loop(
    listener: &TcpListener,
    dispatcher: &dyn Dispatcher,
    shutdown: &ShutdownToken,
    stats: &ServerStats,
    poll_interval: Duration,
) -> io::Result<()> {
    let fd = listener.as_raw_fd();

    while !shutdown.is_requested() {
        if !wait_readable(fd, poll_interval)? {
            continue;
        }

        match listener.accept() {
            Ok((stream, peer)) => {
                // El socket aceptado puede heredar O_NONBLOCK del listener
                if let Err(e) = stream.set_nonblocking(false) {
                    warn!(%peer, "could not make socket blocking: {}", e);
                    continue;
                }
                stats.record_accepted();
                debug!(%peer, dispatcher = dispatcher.name(), "accepted connection");
                dispatcher.dispatch(Connection::new(stream, peer));
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("accept failed: {}", e);
                thread::sleep(ACCEPT_ERROR_BACKOFF);
            }
        }
    }

    Ok(())
}

/// Espera a que `fd` tenga algo para leer
///
/// Devuelve `false` si venció el tiempo o si una señal interrumpió la
/// espera.
pub fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

    let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
    if ready < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }

    Ok(ready > 0 && pollfd.revents & (libc::POLLIN | libc::POLLERR | libc::POLLHUP) != 0)
}
