//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración por argumentos CLI con fallback a variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./otu_server --port 8080 \
//!   --document-root ./www \
//!   --workers 4 \
//!   --mode event-loop
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 DOCUMENT_ROOT=./www DISPATCH_MODE=thread ./otu_server
//! ```

use crate::dispatch::DispatchMode;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Configuración del servidor de archivos estáticos
#[derive(Debug, Clone, Parser)]
#[command(name = "otu_server")]
#[command(about = "Servidor HTTP/1.x de archivos estáticos")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Directorio que se sirve (por defecto, el directorio actual)
    #[arg(short = 'r', long = "document-root", env = "DOCUMENT_ROOT")]
    pub document_root: Option<PathBuf>,

    // === Concurrencia ===
    /// Threads del pool, o procesos réplica en modo event-loop
    #[arg(short, long, default_value = "1", env = "WORKERS")]
    pub workers: usize,

    /// Estrategia de dispatch
    #[arg(short, long, value_enum, default_value = "pool", env = "DISPATCH_MODE")]
    pub mode: DispatchMode,

    // === Tiempos ===
    /// Cada cuánto el accept loop revisa el pedido de apagado (ms)
    #[arg(long = "poll-interval-ms", default_value = "500", env = "POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// Timeout de lectura/escritura por conexión en segundos (0 = sin límite)
    #[arg(long = "timeout-secs", default_value = "30", env = "CONN_TIMEOUT_SECS")]
    pub timeout_secs: u64,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use otu_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `None` cuando el timeout está deshabilitado
    pub fn connection_timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("Workers must be >= 1".to_string());
        }

        if self.poll_interval_ms == 0 {
            return Err("Poll interval must be > 0".to_string());
        }

        if let Some(root) = &self.document_root {
            if !root.is_dir() {
                return Err(format!(
                    "Document root {} is not an existing directory",
                    root.display()
                ));
            }
        }

        Ok(())
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        let root = match &self.document_root {
            Some(root) => root.display().to_string(),
            None => "(current directory)".to_string(),
        };
        let timeout = match self.connection_timeout() {
            Some(t) => format!("{} s", t.as_secs()),
            None => "disabled".to_string(),
        };
        let workers_label = match self.mode {
            DispatchMode::EventLoop => "Replicas:",
            _ => "Workers:",
        };

        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║              OTUServer Static File Server                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        println!("   Address:      {}", self.address());
        println!("   Root:         {}", root);
        println!();
        println!("👷 Dispatch:");
        println!("   Mode:         {}", self.mode);
        println!("   {:<13} {}", workers_label, self.workers);
        println!("   Poll:         {} ms", self.poll_interval_ms);
        println!("   Timeout:      {}", timeout);
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            document_root: None,
            workers: 1,
            mode: DispatchMode::Pool,
            poll_interval_ms: 500,
            timeout_secs: 30,
        }
    }
}
