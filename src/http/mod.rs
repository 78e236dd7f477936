//! # Módulo HTTP
//!
//! Subconjunto mínimo de HTTP/1.x que necesita el servidor:
//!
//! - Parsing de la request line (los headers del cliente se ignoran)
//! - Escritura de la respuesta con headers en buffer
//! - Códigos de estado
//!
//! ### Formato de Request
//!
//! ```text
//! GET /path/file.html?query=value HTTP/1.1\r\n
//! ```
//!
//! ### Formato de Response
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Server: OTUServer\r\n
//! Date: 07 Mar 2024 10:15:00 GMT\r\n
//! Content-Type: text/html\r\n
//! Content-Length: 13\r\n
//! Connection: close\r\n
//! \r\n
//! <html>...</html>
//! ```

pub mod request;   // Parsing de la request line
pub mod response;  // Buffer de headers y copia del body
pub mod status;    // Códigos de estado HTTP

// Re-exportamos los tipos principales para facilitar su uso
pub use request::{Method, ParseError, Request};
pub use response::{PendingResponse, ResponseWriter};
pub use status::StatusCode;
