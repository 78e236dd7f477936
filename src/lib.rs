//! # OTUServer
//! src/lib.rs
//!
//! Servidor HTTP/1.x de archivos estáticos. Solo entiende la request line
//! (`GET` y `HEAD`), sirve archivos debajo de un document root y cierra
//! la conexión después de cada respuesta.
//!
//! ## Arquitectura
//!
//! - `http`: request line, códigos de estado y escritura de respuestas
//! - `files`: resolución segura de paths y tipos MIME
//! - `server`: accept loop, handler por conexión y apagado cooperativo
//! - `dispatch`: pool acotado, thread por conexión o event loop con réplicas
//! - `metrics`: contadores por proceso
//! - `config`: argumentos CLI y variables de entorno
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use otu_server::config::Config;
//! use otu_server::server::Server;
//!
//! let mut config = Config::default();
//! config.document_root = Some("./www".into());
//!
//! let server = Server::bind(config).expect("bind failed");
//! let shutdown = server.shutdown_token();
//! std::thread::spawn(move || server.run());
//!
//! // ... más tarde
//! shutdown.shutdown();
//! ```

pub mod config;
pub mod dispatch;
pub mod files;
pub mod http;
pub mod metrics;
pub mod server;
