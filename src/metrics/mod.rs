/*!
 * # Metrics Module
 *
 * In-memory counters and histograms keyed by name. Domain transitions and HTTP traffic
 * are counted here and exposed at `/metrics` (Prometheus text) and `/metrics/json`.
 */

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Tracks count and sum of observations (milliseconds for latencies).
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    sum: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    pub fn observe(&self, value: f64) {
        self.sum.fetch_add(value.max(0.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64
    }
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Counter>,
    histograms: DashMap<String, Histogram>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_counter(&self, name: &str) -> Counter {
        self.counters
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub fn get_or_create_histogram(&self, name: &str) -> Histogram {
        self.histograms
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Prometheus text exposition, sorted by metric name.
    pub fn export_metrics(&self) -> String {
        let mut counters: Vec<(String, u64)> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get()))
            .collect();
        counters.sort();

        let mut histograms: Vec<(String, u64, f64)> = self
            .histograms
            .iter()
            .map(|entry| {
                let h = entry.value();
                (entry.key().clone(), h.get_count(), h.get_sum())
            })
            .collect();
        histograms.sort_by(|a, b| a.0.cmp(&b.0));

        let mut output = String::new();
        for (name, value) in counters {
            output.push_str(&format!("# TYPE {} counter\n{} {}\n", name, name, value));
        }
        for (name, count, sum) in histograms {
            output.push_str(&format!("# TYPE {} summary\n", name));
            output.push_str(&format!("{}_count {}\n", name, count));
            output.push_str(&format!("{}_sum {}\n", name, sum));
        }
        output
    }

    pub fn export_metrics_json(&self) -> serde_json::Value {
        let counters: serde_json::Map<String, serde_json::Value> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), json!(entry.value().get())))
            .collect();
        let histograms: serde_json::Map<String, serde_json::Value> = self
            .histograms
            .iter()
            .map(|entry| {
                let h = entry.value();
                (
                    entry.key().clone(),
                    json!({ "count": h.get_count(), "sum": h.get_sum() }),
                )
            })
            .collect();

        json!({ "counters": counters, "histograms": histograms })
    }
}

lazy_static::lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

pub fn increment_counter(name: &str) {
    METRICS.get_or_create_counter(name).inc();
}

pub fn increment_counter_by(name: &str, value: u64) {
    METRICS.get_or_create_counter(name).inc_by(value);
}

pub fn observe_histogram(name: &str, value: f64) {
    METRICS.get_or_create_histogram(name).observe(value);
}

pub fn counter_value(name: &str) -> u64 {
    METRICS
        .counters
        .get(name)
        .map(|counter| counter.get())
        .unwrap_or(0)
}

/// Counts requests by status class and records latency.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;

    let class = match response.status().as_u16() {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    };
    increment_counter("http_requests_total");
    increment_counter(&format!("http_responses_{}_total", class));
    observe_histogram(
        "http_request_duration_ms",
        started.elapsed().as_secs_f64() * 1000.0,
    );
    response
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.export_metrics(),
    )
}

pub async fn metrics_json_handler() -> Json<serde_json::Value> {
    Json(METRICS.export_metrics_json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_exports_sorted_text() {
        let registry = MetricsRegistry::new();
        registry.get_or_create_counter("b_total").inc_by(3);
        registry.get_or_create_counter("a_total").inc();
        registry.get_or_create_histogram("latency_ms").observe(12.0);

        let text = registry.export_metrics();
        let a = text.find("a_total 1").unwrap();
        let b = text.find("b_total 3").unwrap();
        assert!(a < b);
        assert!(text.contains("latency_ms_count 1"));
        assert!(text.contains("latency_ms_sum 12"));
    }

    #[test]
    fn json_export_nests_counters() {
        let registry = MetricsRegistry::new();
        registry.get_or_create_counter("orders_created_total").inc();
        let value = registry.export_metrics_json();
        assert_eq!(value["counters"]["orders_created_total"], 1);
    }

    #[test]
    fn global_counter_accumulates() {
        let before = counter_value("metrics_test_total");
        increment_counter("metrics_test_total");
        increment_counter_by("metrics_test_total", 2);
        assert_eq!(counter_value("metrics_test_total"), before + 3);
    }
}
