//! # Resolución de Paths
//! src/files/resolver.rs
//!
//! Convierte el request target en un path dentro del document root.
//!
//! ## Algoritmo
//!
//! 1. Cortar en el primer `?`
//! 2. Recordar si termina en `/`
//! 3. Decodificar `%XX` (sin pérdida en Unix: los bytes pasan tal cual)
//! 4. Normalizar léxicamente (`.`, `..`, `//`)
//! 5. Partir en segmentos y descartar los vacíos
//! 6. Arrancar desde el document root
//! 7. Ignorar segmentos con separador o iguales a `.`/`..`
//! 8. Volver a poner la `/` final si la había
//!
//! Ningún segmento que aporte el cliente puede subir de nivel, así que el
//! resultado siempre queda debajo del root.

use percent_encoding::percent_decode_str;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Path ya resuelto para una petición
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    path: PathBuf,
    trailing_slash: bool,
}

impl ResolvedPath {
    /// Path absoluto (con `/` final si el target la tenía)
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// `true` si el target original terminaba en `/`
    pub fn has_trailing_slash(&self) -> bool {
        self.trailing_slash
    }
}

/// Resuelve targets contra un document root fijo
///
/// Se configura una sola vez al arrancar y después solo se lee, así que
/// se puede compartir entre threads sin sincronización.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Crea un resolver sobre `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Usa el document root configurado o, si no hay, el directorio actual
    pub fn from_document_root(document_root: Option<&Path>) -> io::Result<Self> {
        let root = match document_root {
            Some(root) => root.to_path_buf(),
            None => std::env::current_dir()?,
        };
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resuelve un request target
    ///
    /// # Ejemplo
    /// ```
    /// use otu_server::files::PathResolver;
    /// use std::path::Path;
    ///
    /// let resolver = PathResolver::new("/srv/www");
    /// let resolved = resolver.resolve("/../../etc/passwd?x=1");
    /// assert_eq!(resolved.as_path(), Path::new("/srv/www/etc/passwd"));
    /// ```
    pub fn resolve(&self, target: &str) -> ResolvedPath {
        let target = target.split('?').next().unwrap_or("");
        let trailing_slash = target.trim_end().ends_with('/');

        let decoded: Vec<u8> = percent_decode_str(target).collect();
        let normalized = normalize(&decoded);

        let mut path = self.root.clone();
        for segment in normalized.split(|&b| b == b'/') {
            if !is_plain_segment(segment) {
                continue;
            }
            path.push(segment_to_os(segment));
        }

        if trailing_slash {
            let mut with_slash = path.into_os_string();
            with_slash.push("/");
            path = PathBuf::from(with_slash);
        }

        ResolvedPath { path, trailing_slash }
    }
}

/// Un segmento se usa solo si es un nombre simple
fn is_plain_segment(segment: &[u8]) -> bool {
    if segment.is_empty() || segment == b"." || segment == b".." {
        return false;
    }
    !segment.iter().any(|&b| std::path::is_separator(b as char))
}

/// Normalización léxica estilo POSIX `normpath`
///
/// No toca el filesystem. En un path absoluto los `..` de más se
/// descartan; en uno relativo se conservan (y luego se ignoran al unir).
fn normalize(path: &[u8]) -> Vec<u8> {
    if path.is_empty() {
        return b".".to_vec();
    }
    let absolute = path.starts_with(b"/");

    let mut parts: Vec<&[u8]> = Vec::new();
    for part in path.split(|&b| b == b'/') {
        match part {
            b"" | b"." => {}
            b".." => {
                if parts.last().map_or(false, |last| *last != b"..") {
                    parts.pop();
                } else if !absolute {
                    parts.push(part);
                }
            }
            _ => parts.push(part),
        }
    }

    let mut out = Vec::with_capacity(path.len());
    if absolute {
        out.push(b'/');
    }
    out.extend_from_slice(&parts.join(&b'/'));
    if out.is_empty() {
        out.push(b'.');
    }
    out
}

#[cfg(unix)]
fn segment_to_os(segment: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(segment.to_vec())
}

#[cfg(not(unix))]
fn segment_to_os(segment: &[u8]) -> OsString {
    OsString::from(String::from_utf8_lossy(segment).into_owned())
}
