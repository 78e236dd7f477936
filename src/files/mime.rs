//! # Tipos MIME
//! src/files/mime.rs
//!
//! Tabla fija extensión → Content-Type. Primero se busca la extensión tal
//! cual y, si no está, en minúsculas. Una extensión desconocida devuelve
//! `""` (el header se manda igual, vacío).

use std::path::Path;

/// Extensiones conocidas (sin el punto)
const EXTENSIONS: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("swf", "application/x-shockwave-flash"),
    ("txt", "text/plain"),
];

fn lookup(ext: &str) -> Option<&'static str> {
    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

/// Content-Type según la última extensión del path
///
/// # Ejemplo
/// ```
/// use otu_server::files::guess_type;
/// use std::path::Path;
///
/// assert_eq!(guess_type(Path::new("/srv/a/index.HTML")), "text/html");
/// assert_eq!(guess_type(Path::new("/srv/a/data.bin")), "");
/// ```
pub fn guess_type(path: &Path) -> &'static str {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext,
        None => return "",
    };

    lookup(ext)
        .or_else(|| lookup(&ext.to_lowercase()))
        .unwrap_or("")
}
