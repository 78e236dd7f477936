//! # Escritura de Respuestas HTTP
//! src/http/response.rs
//!
//! La status line y los headers se acumulan en un `PendingResponse` y
//! recién se mandan al socket en `end_headers`, todos juntos en un único
//! `write_all`. El body (si lo hay) va después, copiado por bloques.
//!
//! ## Formato
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Server: OTUServer\r\n
//! Date: 07 Mar 2024 10:15:00 GMT\r\n
//! Content-Type: text/html\r\n
//! Content-Length: 1234\r\n
//! Connection: close\r\n
//! \r\n
//! <bytes del archivo>
//! ```

use super::StatusCode;
use chrono::{DateTime, Utc};
use std::io::{self, Read, Write};

/// Valor del header `Server`
pub const SERVER_NAME: &str = "OTUServer";

/// Tamaño del bloque usado al copiar el body
const COPY_CHUNK: usize = 64 * 1024;

/// Buffer de headers pendientes de una conexión
///
/// Cada elemento es una línea ya codificada (con su `\r\n`). Se construye
/// vacío al empezar cada conexión y nunca se comparte.
#[derive(Debug, Default)]
pub struct PendingResponse {
    lines: Vec<Vec<u8>>,
}

impl PendingResponse {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Agrega una línea al final del buffer
    pub fn push(&mut self, line: Vec<u8>) {
        self.lines.push(line);
    }

    /// Cantidad de líneas acumuladas
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Concatena y vacía el buffer
    fn take_bytes(&mut self) -> Vec<u8> {
        let bytes = self.lines.concat();
        self.lines.clear();
        bytes
    }
}

/// Escritor de respuestas sobre un stream de salida
pub struct ResponseWriter<W: Write> {
    out: W,
    pending: PendingResponse,
    version: String,
}

impl<W: Write> ResponseWriter<W> {
    /// Crea el writer con la versión por defecto para la status line
    pub fn new(out: W) -> Self {
        Self {
            out,
            pending: PendingResponse::new(),
            version: super::request::DEFAULT_VERSION.to_string(),
        }
    }

    /// Fija el token de versión que se repite en la status line
    pub fn set_version(&mut self, version: &str) {
        self.version = version.to_string();
    }

    /// Encola la status line (no se transmite todavía)
    pub fn send_status(&mut self, status: StatusCode) {
        let line = format!("{} {}\r\n", self.version, status);
        self.pending.push(encode_latin1(&line));
    }

    /// Encola un header (no se transmite todavía)
    pub fn send_header(&mut self, name: &str, value: &str) {
        let line = format!("{}: {}\r\n", name, value);
        self.pending.push(encode_latin1(&line));
    }

    /// Status line más los headers comunes `Server` y `Date`
    pub fn send_response(&mut self, status: StatusCode) {
        self.send_status(status);
        self.send_header("Server", SERVER_NAME);
        self.send_header("Date", &http_date(Utc::now()));
    }

    /// Agrega la línea vacía y manda todo el buffer en una sola escritura
    pub fn end_headers(&mut self) -> io::Result<()> {
        self.pending.push(b"\r\n".to_vec());
        let bytes = self.pending.take_bytes();
        self.out.write_all(&bytes)
    }

    /// Respuesta de error completa: status, `Server`, `Date` y fin de headers
    pub fn send_error(&mut self, status: StatusCode) -> io::Result<()> {
        self.send_response(status);
        self.end_headers()
    }

    /// Copia exactamente `len` bytes de `source` a la salida
    ///
    /// Si el archivo se acorta mientras se copia, se devuelve
    /// `UnexpectedEof`: el `Content-Length` ya enviado no se puede cumplir.
    pub fn copy_body<R: Read>(&mut self, source: R, len: u64) -> io::Result<u64> {
        let mut limited = source.take(len);
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut copied: u64 = 0;

        loop {
            let n = match limited.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.out.write_all(&buf[..n])?;
            copied += n as u64;
        }

        if copied < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file shrank while streaming: sent {} of {} bytes", copied, len),
            ));
        }
        Ok(copied)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Headers todavía sin transmitir
    pub fn pending(&self) -> &PendingResponse {
        &self.pending
    }

    /// Devuelve el stream interno
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Formato del header `Date`: `DD Mon YYYY HH:MM:SS GMT`
///
/// # Ejemplo
/// ```
/// use chrono::{TimeZone, Utc};
/// use otu_server::http::response::http_date;
///
/// let when = Utc.with_ymd_and_hms(2024, 3, 7, 10, 15, 0).unwrap();
/// assert_eq!(http_date(when), "07 Mar 2024 10:15:00 GMT");
/// ```
pub fn http_date(when: DateTime<Utc>) -> String {
    when.format("%d %b %Y %H:%M:%S GMT").to_string()
}

/// Codifica en ISO-8859-1; lo que no entra en un byte se reemplaza por `?`
fn encode_latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect()
}
