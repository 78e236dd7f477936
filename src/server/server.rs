//! # Servidor
//! src/server/server.rs
//!
//! Arma las piezas según la configuración: listener no bloqueante,
//! resolver de paths, dispatcher y accept loop. `run` bloquea hasta que
//! se pide el apagado por el `ShutdownToken`.
//!
//! ## Secuencia de apagado
//!
//! 1. El accept loop ve el pedido y deja de aceptar
//! 2. El dispatcher drena las conexiones en curso
//! 3. En modo event-loop se terminan y esperan las réplicas
//! 4. Se cierra el listener
//! 5. Se marca el token como detenido

use crate::config::Config;
use crate::dispatch::{
    DispatchMode, Dispatcher, InlineDispatcher, PoolDispatcher, ReplicaSet, ThreadPerConnection,
};
use crate::files::PathResolver;
use crate::metrics::ServerStats;
use crate::server::acceptor::accept_loop;
use crate::server::connection::ConnectionService;
use crate::server::shutdown::{ShutdownToken, StoppedGuard};
use anyhow::Context;
use std::io;
use std::net::{SocketAddr, TcpListener};
use tracing::{error, info};

/// Servidor de archivos estáticos
pub struct Server {
    config: Config,
    listener: TcpListener,
    service: ConnectionService,
    shutdown: ShutdownToken,
}

impl Server {
    /// Resuelve el document root y abre el socket de escucha
    ///
    /// El document root se fija acá, así que cambiar de directorio
    /// después no afecta lo que se sirve.
    pub fn bind(config: Config) -> anyhow::Result<Self> {
        let resolver = PathResolver::from_document_root(config.document_root.as_deref())
            .context("could not determine document root")?;

        let address = config.address();
        let listener = TcpListener::bind(&address)
            .with_context(|| format!("could not listen on {}", address))?;
        listener
            .set_nonblocking(true)
            .context("could not make listener non-blocking")?;

        let service = ConnectionService::new(resolver, config.connection_timeout(), ServerStats::new());

        Ok(Self {
            config,
            listener,
            service,
            shutdown: ShutdownToken::new(),
        })
    }

    /// Dirección real (útil con puerto 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token para pedir el apagado desde otro thread o un signal handler
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> ServerStats {
        self.service.stats().clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Atiende conexiones hasta que se pida el apagado
    pub fn run(self) -> anyhow::Result<()> {
        let _stopped = StoppedGuard(self.shutdown.clone());
        self.run_until_shutdown()
    }

    /// Consume el servidor: el listener se cierra al volver
    fn run_until_shutdown(self) -> anyhow::Result<()> {
        let addr = self.local_addr()?;
        info!(
            %addr,
            root = %self.service.resolver().root().display(),
            mode = %self.config.mode,
            workers = self.config.workers,
            "server listening"
        );

        let result = match self.config.mode {
            DispatchMode::Pool => {
                let mut dispatcher = PoolDispatcher::new(self.config.workers, self.service.clone())
                    .context("could not start thread pool")?;
                self.serve(&mut dispatcher)
            }
            DispatchMode::Thread => {
                let mut dispatcher = ThreadPerConnection::new(self.service.clone());
                self.serve(&mut dispatcher)
            }
            DispatchMode::EventLoop => self.run_event_loop(),
        };

        info!(stats = %self.service.stats().to_json(), "server stopped");
        result
    }

    /// Acepta hasta el apagado y después drena, aunque el loop falle
    fn serve(&self, dispatcher: &mut dyn Dispatcher) -> anyhow::Result<()> {
        let result = accept_loop(
            &self.listener,
            &*dispatcher,
            &self.shutdown,
            self.service.stats(),
            self.config.poll_interval(),
        );
        dispatcher.drain();
        result.context("accept loop failed")
    }

    /// Padre y réplicas corren el mismo loop sobre el listener heredado
    fn run_event_loop(&self) -> anyhow::Result<()> {
        let cancel = self.shutdown.flag();
        let mut replicas = ReplicaSet::spawn(self.config.workers, &cancel, || self.run_replica())
            .context("could not fork replica processes")?;

        let mut dispatcher = InlineDispatcher::new(self.service.clone());
        let result = self.serve(&mut dispatcher);

        let total = replicas.len();
        let clean = replicas.terminate();
        info!(replicas = total, clean, "replica processes reaped");
        result
    }

    /// Cuerpo de cada proceso réplica; devuelve el exit code
    fn run_replica(&self) -> i32 {
        let pid = std::process::id();
        info!(pid, "replica accepting connections");

        let mut dispatcher = InlineDispatcher::new(self.service.clone());
        let code = match self.serve(&mut dispatcher) {
            Ok(()) => 0,
            Err(e) => {
                error!(pid, "replica failed: {:#}", e);
                1
            }
        };

        info!(pid, stats = %self.service.stats().to_json(), "replica stopped");
        code
    }
}
