//! # Códigos de Estado HTTP
//! src/http/status.rs
//!
//! El servidor solo emite tres códigos:
//!
//! - **200**: el archivo se encontró y se envía
//! - **404**: archivo inexistente, ilegible o directorio sin `index.html`
//! - **405**: método no soportado, request line mal formada o directorio
//!   pedido sin `/` final (se reutiliza 405 a propósito, no es un redirect)

/// Códigos de estado que puede producir el servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 200 OK - El archivo se envía completo
    Ok = 200,

    /// 404 Not Found - Recurso inexistente o ilegible
    NotFound = 404,

    /// 405 Method Not Allowed - Método o forma de la petición no soportada
    MethodNotAllowed = 405,
}

impl StatusCode {
    /// Convierte el código a su valor numérico
    ///
    /// # Ejemplo
    /// ```
    /// use otu_server::http::StatusCode;
    /// assert_eq!(StatusCode::MethodNotAllowed.as_u16(), 405);
    /// ```
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Texto de razón que acompaña al código en la status line
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
        }
    }
}

impl std::fmt::Display for StatusCode {
    /// Formato: "404 Not Found"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}
