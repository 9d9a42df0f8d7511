use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use serde::Serialize;

pub const RESPONSE_TIME_HEADER: &str = "x-response-time-ms";

static TELEMETRY: OnceLock<Telemetry> = OnceLock::new();

/// Process-wide request timing. Initialised once at startup, written by the
/// timing middleware and read by the performance endpoint.
#[derive(Debug)]
pub struct Telemetry {
    started: Instant,
    last_response_micros: AtomicU64,
}

impl Telemetry {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_response_micros: AtomicU64::new(0),
        }
    }

    /// Anchors the uptime clock. Later calls return the existing instance.
    pub fn init() -> &'static Telemetry {
        TELEMETRY.get_or_init(Telemetry::new)
    }

    pub fn global() -> &'static Telemetry {
        Self::init()
    }

    pub fn record(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.last_response_micros.store(micros, Ordering::Relaxed);
    }

    pub fn last_response(&self) -> Duration {
        Duration::from_micros(self.last_response_micros.load(Ordering::Relaxed))
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn report(&self, threads: usize) -> PerformanceReport {
        PerformanceReport {
            time: format_clock(self.last_response()),
            memory: format_megabytes(resident_memory_bytes()),
            uptime: format_clock(self.uptime()),
            threads,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub time: String,
    pub memory: String,
    pub uptime: String,
    pub threads: usize,
}

/// `HH:mm:ss.SSS`; hours are not wrapped at 24.
pub fn format_clock(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    let millis = duration.subsec_millis();
    format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
}

/// Resident set size of this process; zero where the platform reports none.
pub fn resident_memory_bytes() -> usize {
    memory_stats::memory_stats()
        .map(|stats| stats.physical_mem)
        .unwrap_or(0)
}

pub fn format_megabytes(bytes: usize) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

pub async fn record_timing(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = started.elapsed();
    Telemetry::global().record(elapsed);

    let millis = format!("{:.2}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(value) = HeaderValue::from_str(&millis) {
        response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_format_pads_every_field() {
        assert_eq!(format_clock(Duration::ZERO), "00:00:00.000");
        assert_eq!(format_clock(Duration::from_millis(1_234)), "00:00:01.234");
        assert_eq!(
            format_clock(Duration::from_millis(3_723_045)),
            "01:02:03.045"
        );
    }

    #[test]
    fn clock_format_does_not_wrap_days() {
        assert_eq!(format_clock(Duration::from_secs(25 * 3600)), "25:00:00.000");
    }

    #[test]
    fn memory_is_reported_in_megabytes() {
        assert_eq!(format_megabytes(0), "0.00 MB");
        assert_eq!(format_megabytes(3 * 1024 * 1024 / 2), "1.50 MB");
        assert_eq!(format_megabytes(123_456_789), "117.74 MB");
    }

    #[test]
    fn recorded_time_is_reported() {
        let telemetry = Telemetry::new();
        telemetry.record(Duration::from_millis(42));
        assert_eq!(telemetry.last_response(), Duration::from_millis(42));
        let report = telemetry.report(4);
        assert_eq!(report.time, "00:00:00.042");
        assert_eq!(report.threads, 4);
        assert!(report.memory.ends_with(" MB"), "{}", report.memory);
    }
}
