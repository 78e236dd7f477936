//! # Estadísticas
//! src/metrics/mod.rs
//!
//! Contadores de conexiones y respuestas. Se loguean como JSON al apagar
//! cada proceso del servidor.

pub mod collector;

pub use collector::{ServerStats, StatsSnapshot};
