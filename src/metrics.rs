use axum::http::{header, StatusCode};
use axum::{routing::get, Router};
use once_cell::sync::Lazy;
use prometheus::{opts, HistogramVec, IntCounterVec, Registry};

// 全局静态指标实例
pub static METRICS: Lazy<DohMetrics> = Lazy::new(DohMetrics::new);

// DoH 代理性能指标
pub struct DohMetrics {
    registry: Registry,

    // 1. 入站请求指标
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    request_errors_total: IntCounterVec,

    // 2. 上游 DoH 解析器指标
    upstream_requests_total: IntCounterVec,
    upstream_errors_total: IntCounterVec,
    upstream_duration_seconds: HistogramVec,

    // 3. 格式协商指标
    negotiation_attempts_total: IntCounterVec,
}

impl Default for DohMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DohMetrics {
    // 创建新的指标收集器
    pub fn new() -> Self {
        let registry = Registry::new();

        // 1. 入站请求指标
        let http_requests_total = IntCounterVec::new(
            opts!(
                "edgedoh_http_requests_total",
                "Total inbound DoH requests, classified by dispatch route"
            ),
            &["route"],
        )
        .unwrap();

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::histogram_opts!(
                "edgedoh_http_request_duration_seconds",
                "Inbound request processing duration in seconds, classified by dispatch route",
                vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
            ),
            &["route"],
        )
        .unwrap();

        let request_errors_total = IntCounterVec::new(
            opts!(
                "edgedoh_request_errors_total",
                "Total failed inbound requests, classified by error type"
            ),
            &["error_type"],
        )
        .unwrap();

        // 2. 上游 DoH 解析器指标
        let upstream_requests_total = IntCounterVec::new(
            opts!(
                "edgedoh_upstream_requests_total",
                "Total requests sent to upstream DoH resolvers, classified by upstream host"
            ),
            &["upstream"],
        )
        .unwrap();

        let upstream_errors_total = IntCounterVec::new(
            opts!(
                "edgedoh_upstream_errors_total",
                "Total upstream DoH resolver errors, classified by error type and upstream host"
            ),
            &["error_type", "upstream"],
        )
        .unwrap();

        let upstream_duration_seconds = HistogramVec::new(
            prometheus::histogram_opts!(
                "edgedoh_upstream_duration_seconds",
                "Upstream DoH request duration in seconds, classified by upstream host",
                vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
            ),
            &["upstream"],
        )
        .unwrap();

        // 3. 格式协商指标
        let negotiation_attempts_total = IntCounterVec::new(
            opts!(
                "edgedoh_negotiation_attempts_total",
                "Total format negotiation attempts, classified by header candidate and outcome"
            ),
            &["candidate", "outcome"],
        )
        .unwrap();

        let metrics = DohMetrics {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            request_errors_total,
            upstream_requests_total,
            upstream_errors_total,
            upstream_duration_seconds,
            negotiation_attempts_total,
        };

        // 注册所有指标
        metrics.register_all_metrics();

        metrics
    }

    // 注册所有指标
    fn register_all_metrics(&self) {
        self.registry
            .register(Box::new(self.http_requests_total.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.http_request_duration_seconds.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.request_errors_total.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.upstream_requests_total.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.upstream_errors_total.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.upstream_duration_seconds.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.negotiation_attempts_total.clone()))
            .unwrap();
    }

    // 获取 Prometheus 注册表
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn http_requests_total(&self) -> &IntCounterVec {
        &self.http_requests_total
    }

    pub fn http_request_duration_seconds(&self) -> &HistogramVec {
        &self.http_request_duration_seconds
    }

    pub fn request_errors_total(&self) -> &IntCounterVec {
        &self.request_errors_total
    }

    pub fn upstream_requests_total(&self) -> &IntCounterVec {
        &self.upstream_requests_total
    }

    pub fn upstream_errors_total(&self) -> &IntCounterVec {
        &self.upstream_errors_total
    }

    pub fn upstream_duration_seconds(&self) -> &HistogramVec {
        &self.upstream_duration_seconds
    }

    pub fn negotiation_attempts_total(&self) -> &IntCounterVec {
        &self.negotiation_attempts_total
    }
}

// 提供指标导出路由
pub fn metrics_routes() -> Router {
    Router::new().route(
        "/metrics",
        get(|| async {
            let encoder = prometheus::TextEncoder::new();

            // 直接从全局METRICS获取所有注册的指标
            let metric_families = METRICS.registry().gather();

            // 编码为文本格式
            let mut buffer = String::new();
            if let Err(e) = encoder.encode_utf8(&metric_families, &mut buffer) {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(header::CONTENT_TYPE, "text/plain")],
                    format!("Failed to encode metrics: {}", e),
                );
            }

            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
                buffer,
            )
        }),
    )
}
