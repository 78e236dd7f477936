//! # Parsing de la Request Line
//! src/http/request.rs
//!
//! Solo se interpreta la primera línea de la conexión. Los headers que
//! mande el cliente nunca se leen.
//!
//! ## Formas aceptadas
//!
//! ```text
//! METHOD SP TARGET SP VERSION CRLF     (3 tokens, cualquier método)
//! GET SP TARGET CRLF                   (2 tokens, solo GET)
//! ```
//!
//! Una línea vacía no produce respuesta. Cualquier otra forma es un 405.
//!
//! Los tokens se separan por whitespace Unicode más los separadores de
//! información ASCII (`0x1C`..`0x1F`).

use std::io::{self, BufRead, Read};

/// Máximo de bytes que se leen buscando el fin de la request line
pub const MAX_REQUEST_LINE: u64 = 65537;

/// Versión usada en la status line cuando el cliente no mandó ninguna
pub const DEFAULT_VERSION: &str = "HTTP/1.0";

/// Métodos con comportamiento asociado
///
/// Es un conjunto cerrado: todo lo que no sea GET o HEAD cae en
/// `UNSUPPORTED` y se responde con 405.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Headers y body del archivo
    GET,

    /// HEAD - Los mismos headers que GET, sin body
    HEAD,

    /// Cualquier otro token
    UNSUPPORTED,
}

impl Method {
    /// Mapea el token de la request line a un método
    ///
    /// La comparación es exacta: `get` no es `GET`.
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::GET,
            "HEAD" => Method::HEAD,
            _ => Method::UNSUPPORTED,
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::UNSUPPORTED => "UNSUPPORTED",
        }
    }
}

/// Request line ya tokenizada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Token de método tal cual llegó
    method: String,

    /// Request target crudo (puede traer `?query` y `%XX`)
    target: String,

    /// Token de versión, `None` en la forma de 2 tokens
    version: Option<String>,
}

/// Errores que puede producir el parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// La línea no tenía tokens: se cierra sin responder
    EmptyRequest,

    /// Forma no soportada (cantidad de tokens o método en la forma corta).
    /// Se responde 405 usando `DEFAULT_VERSION`.
    MethodNotAllowed,
}

impl ParseError {
    /// `true` si el error debe producir una respuesta
    pub fn is_reportable(&self) -> bool {
        matches!(self, ParseError::MethodNotAllowed)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::EmptyRequest => write!(f, "Empty request line"),
            ParseError::MethodNotAllowed => write!(f, "Method Not Allowed"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Lee la request line: hasta `\n` inclusive o hasta `MAX_REQUEST_LINE` bytes
///
/// Un vector vacío significa que el peer cerró sin mandar nada.
pub fn read_request_line<R: BufRead>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    reader.take(MAX_REQUEST_LINE).read_until(b'\n', &mut line)?;
    Ok(line)
}

impl Request {
    /// Parsea la request line cruda
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use otu_server::http::Request;
    ///
    /// let request = Request::parse(b"GET /index.html?x=1 HTTP/1.1\r\n").unwrap();
    /// assert_eq!(request.method(), "GET");
    /// assert_eq!(request.target(), "/index.html?x=1");
    /// assert_eq!(request.version(), "HTTP/1.1");
    /// ```
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let line = decode_latin1(raw);
        let line = line.trim_end_matches(&['\r', '\n'][..]);

        let words: Vec<&str> = line
            .split(is_token_separator)
            .filter(|word| !word.is_empty())
            .collect();

        match words.as_slice() {
            [method, target, version] => Ok(Request {
                method: method.to_string(),
                target: target.to_string(),
                version: Some(version.to_string()),
            }),
            [method, target] => {
                if *method != "GET" {
                    return Err(ParseError::MethodNotAllowed);
                }
                Ok(Request {
                    method: method.to_string(),
                    target: target.to_string(),
                    version: None,
                })
            }
            [] => Err(ParseError::EmptyRequest),
            _ => Err(ParseError::MethodNotAllowed),
        }
    }

    // === Métodos públicos para acceder a los campos ===

    /// Token de método crudo
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Método ya mapeado al conjunto cerrado
    pub fn method_kind(&self) -> Method {
        Method::from_token(&self.method)
    }

    /// Request target crudo
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Versión para la status line
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }
}

/// Whitespace Unicode o separador de información (FS, GS, RS, US)
fn is_token_separator(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}

/// ISO-8859-1: cada byte es exactamente el code point del mismo valor
fn decode_latin1(raw: &[u8]) -> String {
    raw.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_three_tokens() {
        let request = Request::parse(b"GET /a/b.html HTTP/1.1\r\n").unwrap();

        assert_eq!(request.method(), "GET");
        assert_eq!(request.method_kind(), Method::GET);
        assert_eq!(request.target(), "/a/b.html");
        assert_eq!(request.version(), "HTTP/1.1");
    }

    #[test]
    fn test_parse_three_tokens_any_method() {
        // El método se valida después, en el handler
        let request = Request::parse(b"POST / HTTP/1.1\r\n").unwrap();
        assert_eq!(request.method_kind(), Method::UNSUPPORTED);
    }

    #[test]
    fn test_parse_two_tokens_get() {
        let request = Request::parse(b"GET /index.html\r\n").unwrap();

        assert_eq!(request.target(), "/index.html");
        assert_eq!(request.version(), DEFAULT_VERSION);
    }

    #[test]
    fn test_parse_two_tokens_other_method() {
        let result = Request::parse(b"HEAD /index.html\r\n");
        assert_eq!(result, Err(ParseError::MethodNotAllowed));
    }

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(Request::parse(b"\r\n"), Err(ParseError::EmptyRequest));
        assert_eq!(Request::parse(b"   \r\n"), Err(ParseError::EmptyRequest));
        assert!(!ParseError::EmptyRequest.is_reportable());
    }

    #[test]
    fn test_parse_wrong_token_count() {
        let one = Request::parse(b"GET\r\n").unwrap_err();
        assert!(one.is_reportable());

        let four = Request::parse(b"GET / HTTP/1.1 extra\r\n").unwrap_err();
        assert_eq!(four, ParseError::MethodNotAllowed);
    }

    #[test]
    fn test_parse_latin1_bytes() {
        // 0xE9 = 'é' en Latin-1, no es UTF-8 válido solo
        let request = Request::parse(b"GET /caf\xe9 HTTP/1.0\r\n").unwrap();
        assert_eq!(request.target(), "/caf\u{e9}");
    }

    #[test]
    fn test_parse_without_crlf() {
        let request = Request::parse(b"GET / HTTP/1.0").unwrap();
        assert_eq!(request.version(), "HTTP/1.0");
    }

    #[test]
    fn test_method_from_token_is_case_sensitive() {
        assert_eq!(Method::from_token("GET"), Method::GET);
        assert_eq!(Method::from_token("HEAD"), Method::HEAD);
        assert_eq!(Method::from_token("get"), Method::UNSUPPORTED);
        assert_eq!(Method::from_token("DELETE"), Method::UNSUPPORTED);
        assert_eq!(Method::from_token("PUT").as_str(), "UNSUPPORTED");
    }

    #[test]
    fn test_parse_information_separators_split_tokens() {
        let request = Request::parse(b"GET\x1f/index.html\x1cHTTP/1.1\r\n").unwrap();
        assert_eq!(request.method(), "GET");
        assert_eq!(request.target(), "/index.html");
        assert_eq!(request.version(), "HTTP/1.1");

        // NBSP (0xA0 en Latin-1) también separa
        let request = Request::parse(b"HEAD\xa0/ HTTP/1.0\r\n").unwrap();
        assert_eq!(request.method_kind(), Method::HEAD);
        assert_eq!(request.target(), "/");
    }

    #[test]
    fn test_read_request_line_stops_at_newline() {
        let mut reader = Cursor::new(b"GET / HTTP/1.0\r\nHost: x\r\n\r\n".to_vec());
        let line = read_request_line(&mut reader).unwrap();
        assert_eq!(line, b"GET / HTTP/1.0\r\n");
    }

    #[test]
    fn test_read_request_line_is_bounded() {
        let long = vec![b'a'; 100_000];
        let mut reader = Cursor::new(long);
        let line = read_request_line(&mut reader).unwrap();
        assert_eq!(line.len() as u64, MAX_REQUEST_LINE);
    }

    #[test]
    fn test_read_request_line_empty_stream() {
        let mut reader = Cursor::new(Vec::new());
        assert!(read_request_line(&mut reader).unwrap().is_empty());
    }
}
