//! # Estadísticas del Servidor
//! src/metrics/collector.rs
//!
//! Contadores por proceso. Cada réplica del modo event-loop lleva los
//! suyos; no se agregan entre procesos.

use crate::http::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Máximo de latencias guardadas para los percentiles
const MAX_LATENCIES: usize = 10_000;

/// Estadísticas thread-safe, baratas de clonar
#[derive(Clone)]
pub struct ServerStats {
    inner: Arc<Mutex<StatsData>>,
    start_time: Instant,
}

#[derive(Default)]
struct StatsData {
    /// Conexiones aceptadas por el accept loop
    accepted: u64,

    /// Conexiones que un worker empezó a atender; las que esperan en la
    /// cola del pool todavía no cuentan
    started: u64,

    /// Respuestas escritas por código
    status_codes: BTreeMap<u16, u64>,

    /// Conexiones cerradas sin escribir nada
    closed_silently: u64,

    timeouts: u64,

    /// Errores inesperados y panics en el handler
    failures: u64,

    /// Conexiones siendo atendidas ahora mismo
    in_flight: u64,

    /// Duración de cada conexión (microsegundos)
    latencies: Vec<u64>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StatsData::default())),
            start_time: Instant::now(),
        }
    }

    /// Un panic con el lock tomado no invalida contadores
    fn data(&self) -> MutexGuard<'_, StatsData> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// El accept loop obtuvo una conexión, antes de despacharla
    pub fn record_accepted(&self) {
        self.data().accepted += 1;
    }

    /// Empieza a atenderse una conexión
    pub fn connection_opened(&self) {
        let mut data = self.data();
        data.started += 1;
        data.in_flight += 1;
    }

    /// Terminó una conexión, con cualquier resultado
    pub fn connection_closed(&self, elapsed: Duration) {
        let mut data = self.data();
        data.in_flight = data.in_flight.saturating_sub(1);

        if data.latencies.len() >= MAX_LATENCIES {
            data.latencies.remove(0);
        }
        data.latencies.push(elapsed.as_micros() as u64);
    }

    pub fn record_status(&self, status: StatusCode) {
        let mut data = self.data();
        *data.status_codes.entry(status.as_u16()).or_insert(0) += 1;
    }

    pub fn record_silent_close(&self) {
        self.data().closed_silently += 1;
    }

    pub fn record_timeout(&self) {
        self.data().timeouts += 1;
    }

    pub fn record_failure(&self) {
        self.data().failures += 1;
    }

    pub fn in_flight(&self) -> u64 {
        self.data().in_flight
    }

    /// Foto de los contadores actuales
    pub fn snapshot(&self) -> StatsSnapshot {
        let data = self.data();
        let (p50, p95, p99) = percentiles(&data.latencies);

        StatsSnapshot {
            pid: std::process::id(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            accepted: data.accepted,
            started: data.started,
            responses: data.status_codes.values().sum(),
            status_codes: data.status_codes.clone(),
            closed_silently: data.closed_silently,
            timeouts: data.timeouts,
            failures: data.failures,
            in_flight: data.in_flight,
            latency_p50_us: p50,
            latency_p95_us: p95,
            latency_p99_us: p99,
        }
    }

    /// Snapshot serializado para los logs
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| String::from("{}"))
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

fn percentiles(latencies: &[u64]) -> (u64, u64, u64) {
    if latencies.is_empty() {
        return (0, 0, 0);
    }

    let mut sorted = latencies.to_vec();
    sorted.sort_unstable();

    let len = sorted.len();
    (
        sorted[len * 50 / 100],
        sorted[len * 95 / 100],
        sorted[len * 99 / 100],
    )
}

/// Estadísticas de un proceso en un instante
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub pid: u32,
    pub uptime_secs: u64,
    pub accepted: u64,
    pub started: u64,
    pub responses: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub closed_silently: u64,
    pub timeouts: u64,
    pub failures: u64,
    pub in_flight: u64,
    pub latency_p50_us: u64,
    pub latency_p95_us: u64,
    pub latency_p99_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_status() {
        let stats = ServerStats::new();

        stats.record_status(StatusCode::Ok);
        stats.record_status(StatusCode::Ok);
        stats.record_status(StatusCode::NotFound);
        stats.record_status(StatusCode::MethodNotAllowed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.responses, 4);
        assert_eq!(snapshot.status_codes.get(&200), Some(&2));
        assert_eq!(snapshot.status_codes.get(&404), Some(&1));
        assert_eq!(snapshot.status_codes.get(&405), Some(&1));
    }

    #[test]
    fn test_in_flight_tracking() {
        let stats = ServerStats::new();
        assert_eq!(stats.in_flight(), 0);

        stats.connection_opened();
        stats.connection_opened();
        assert_eq!(stats.in_flight(), 2);

        stats.connection_closed(Duration::from_millis(1));
        assert_eq!(stats.in_flight(), 1);

        stats.connection_closed(Duration::from_millis(1));
        stats.connection_closed(Duration::from_millis(1));
        assert_eq!(stats.in_flight(), 0);
        assert_eq!(stats.snapshot().started, 2);
    }

    #[test]
    fn test_accepted_is_separate_from_started() {
        let stats = ServerStats::new();

        // Tres aceptadas, una sola ya en manos de un worker
        stats.record_accepted();
        stats.record_accepted();
        stats.record_accepted();
        stats.connection_opened();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.accepted, 3);
        assert_eq!(snapshot.started, 1);
        assert_eq!(snapshot.in_flight, 1);
    }

    #[test]
    fn test_other_outcomes() {
        let stats = ServerStats::new();

        stats.record_silent_close();
        stats.record_timeout();
        stats.record_timeout();
        stats.record_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.closed_silently, 1);
        assert_eq!(snapshot.timeouts, 2);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.responses, 0);
    }

    #[test]
    fn test_percentiles_are_ordered() {
        let stats = ServerStats::new();
        for i in 1..=100 {
            stats.connection_opened();
            stats.connection_closed(Duration::from_micros(i));
        }

        let snapshot = stats.snapshot();
        assert!(snapshot.latency_p50_us > 0);
        assert!(snapshot.latency_p95_us >= snapshot.latency_p50_us);
        assert!(snapshot.latency_p99_us >= snapshot.latency_p95_us);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let stats = ServerStats::new();
        for i in 0..(MAX_LATENCIES as u64 + 500) {
            stats.connection_opened();
            stats.connection_closed(Duration::from_micros(i));
        }
        assert_eq!(stats.data().latencies.len(), MAX_LATENCIES);
    }

    #[test]
    fn test_json_snapshot() {
        let stats = ServerStats::new();
        stats.record_status(StatusCode::Ok);

        let json: serde_json::Value = serde_json::from_str(&stats.to_json()).unwrap();
        assert_eq!(json["responses"], 1);
        assert_eq!(json["status_codes"]["200"], 1);
        assert_eq!(json["pid"], std::process::id());
    }

    #[test]
    fn test_clones_share_counters() {
        let stats = ServerStats::new();
        let clone = stats.clone();

        let handle = std::thread::spawn(move || {
            for _ in 0..100 {
                clone.record_status(StatusCode::Ok);
            }
        });
        handle.join().unwrap();

        assert_eq!(stats.snapshot().status_codes.get(&200), Some(&100));
    }
}
