//! # Archivos Estáticos
//!
//! - `resolver`: request target → path seguro dentro del document root
//! - `mime`: extensión → Content-Type

pub mod mime;
pub mod resolver;

pub use mime::guess_type;
pub use resolver::{PathResolver, ResolvedPath};

/// Único documento por defecto dentro de un directorio
pub const INDEX_FILE: &str = "index.html";
