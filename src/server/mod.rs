//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! 1. `acceptor`: espera readiness y acepta conexiones
//! 2. `connection`: frontera de errores alrededor de cada conexión
//! 3. `handler`: request line → archivo → respuesta
//! 4. `shutdown`: token de apagado cooperativo
//! 5. `server`: arma todo según la configuración

pub mod acceptor;
pub mod connection;
pub mod handler;
#[allow(clippy::module_inception)]
pub mod server;
pub mod shutdown;

// Re-exportar para facilitar el uso
pub use connection::{Connection, ConnectionService};
pub use handler::{ConnectionHandler, Outcome};
pub use server::Server;
pub use shutdown::ShutdownToken;
