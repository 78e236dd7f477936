//! # Manejo de una Conexión
//! src/server/handler.rs
//!
//! `ConnectionHandler` es la unidad de trabajo que ejecuta cualquier
//! dispatcher: lee la request line, resuelve el archivo y escribe la
//! respuesta. No sabe nada de threads ni de procesos.
//!
//! ## Errores
//!
//! - Petición vacía: se cierra sin escribir nada
//! - Forma inválida / método no soportado / directorio sin `/`: 405
//! - Archivo inexistente, ilegible o directorio sin `index.html`: 404
//! - Timeout del socket: se abandona la conexión sin responder
//! - Cualquier otra falla de I/O se devuelve al dispatcher

use crate::files::{guess_type, PathResolver, INDEX_FILE};
use crate::http::request::read_request_line;
use crate::http::{Method, ParseError, Request, ResponseWriter, StatusCode};
use anyhow::Context;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::debug;

/// Cómo terminó una conexión que no falló
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Se escribió una respuesta completa
    Responded(StatusCode),

    /// El cliente no mandó nada útil; no se escribió ningún byte
    Closed,

    /// Venció el timeout de lectura o escritura
    TimedOut,
}

/// Archivo abierto y listo para enviar
struct OpenedFile {
    file: File,
    len: u64,
    content_type: &'static str,
}

/// Procesa una única conexión de principio a fin
pub struct ConnectionHandler<R: BufRead, W: Write> {
    resolver: Arc<PathResolver>,
    reader: R,
    writer: ResponseWriter<W>,
}

impl<R: BufRead, W: Write> ConnectionHandler<R, W> {
    /// El buffer de headers nace vacío con cada handler
    pub fn new(resolver: Arc<PathResolver>, reader: R, writer: W) -> Self {
        Self {
            resolver,
            reader,
            writer: ResponseWriter::new(writer),
        }
    }

    /// Atiende la conexión
    ///
    /// Solo devuelve `Err` ante fallas inesperadas del stream; los errores
    /// de la petición ya quedaron convertidos en una respuesta HTTP.
    pub fn handle(mut self) -> anyhow::Result<Outcome> {
        match self.process() {
            Ok(outcome) => Ok(outcome),
            Err(e) if is_timeout(&e) => Ok(Outcome::TimedOut),
            Err(e) => Err(e).context("connection stream failed"),
        }
    }

    fn process(&mut self) -> io::Result<Outcome> {
        let raw = read_request_line(&mut self.reader)?;
        if raw.is_empty() {
            return Ok(Outcome::Closed);
        }

        let request = match Request::parse(&raw) {
            Ok(request) => request,
            Err(ParseError::EmptyRequest) => return Ok(Outcome::Closed),
            Err(ParseError::MethodNotAllowed) => {
                return self.respond_error(StatusCode::MethodNotAllowed);
            }
        };
        self.writer.set_version(request.version());

        let method = request.method_kind();
        debug!(method = method.as_str(), target = request.target(), "request line");

        let outcome = match method {
            Method::GET => self.respond_file(&request, true)?,
            Method::HEAD => self.respond_file(&request, false)?,
            Method::UNSUPPORTED => self.respond_error(StatusCode::MethodNotAllowed)?,
        };

        self.writer.flush()?;
        Ok(outcome)
    }

    /// Respuesta de error con `Server` y `Date`, sin body
    fn respond_error(&mut self, status: StatusCode) -> io::Result<Outcome> {
        self.writer.send_error(status)?;
        self.writer.flush()?;
        Ok(Outcome::Responded(status))
    }

    /// GET y HEAD comparten todo salvo el envío del body
    fn respond_file(&mut self, request: &Request, with_body: bool) -> io::Result<Outcome> {
        let opened = match self.open_target(request.target()) {
            Ok(opened) => opened,
            Err(status) => return self.respond_error(status),
        };

        self.writer.send_response(StatusCode::Ok);
        self.writer.send_header("Content-Type", opened.content_type);
        self.writer.send_header("Content-Length", &opened.len.to_string());
        self.writer.send_header("Connection", "close");
        self.writer.end_headers()?;

        if with_body {
            self.writer.copy_body(opened.file, opened.len)?;
        }
        Ok(Outcome::Responded(StatusCode::Ok))
    }

    /// Resuelve y abre el archivo pedido, o dice qué código responder
    fn open_target(&self, target: &str) -> Result<OpenedFile, StatusCode> {
        let resolved = self.resolver.resolve(target);
        let mut path = resolved.as_path().to_path_buf();

        if path.is_dir() {
            // Se mantiene 405 (y no un redirect) para directorios sin `/`
            if !resolved.has_trailing_slash() {
                return Err(StatusCode::MethodNotAllowed);
            }
            let index = path.join(INDEX_FILE);
            if !index.exists() {
                return Err(StatusCode::NotFound);
            }
            path = index;
        }

        let content_type = guess_type(&path);
        let file = File::open(&path).map_err(|_| StatusCode::NotFound)?;
        let metadata = file.metadata().map_err(|_| StatusCode::NotFound)?;
        if metadata.is_dir() {
            return Err(StatusCode::NotFound);
        }

        Ok(OpenedFile {
            file,
            len: metadata.len(),
            content_type,
        })
    }
}

/// En Unix un timeout de socket llega como `WouldBlock`
fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
