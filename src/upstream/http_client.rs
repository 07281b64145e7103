use crate::config::HttpClientConfig;
use crate::error::{AppError, UpstreamError};
use crate::metrics::METRICS;
use crate::r#const::http_client_limits;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

// 单次上游请求
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl UpstreamRequest {
    // 创建 GET 请求
    pub fn get(url: Url, headers: HeaderMap) -> Self {
        Self {
            url,
            method: Method::GET,
            headers,
            body: None,
        }
    }

    // 创建带请求体的 POST 请求
    pub fn post(url: Url, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            url,
            method: Method::POST,
            headers,
            body: Some(body),
        }
    }
}

// 上游响应（仅在状态码为 2xx 时返回）
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// 上游传输层
///
/// 每次调用只发出一个请求，不做任何重试，回退逻辑由调用方负责。
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}

// 基于 reqwest 连接池的上游客户端
pub struct HttpClient {
    client: reqwest::Client,
    // 单次请求超时
    attempt_timeout: Duration,
}

impl HttpClient {
    // 创建HTTP客户端
    pub fn new(config: &HttpClientConfig) -> Result<Self, AppError> {
        debug!("Creating HTTP client for upstream, config: {:?}", config);

        // 创建客户端构建器
        let mut client_builder = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(config.connect_timeout));

        // 配置TCP keepalive
        if let Some(ref keepalive) = config.keepalive {
            client_builder = client_builder.tcp_keepalive(Duration::from_secs(*keepalive as u64));
        }

        // 配置空闲连接超时
        if let Some(idle_timeout) = config.idle_timeout {
            client_builder = client_builder.pool_idle_timeout(Duration::from_secs(idle_timeout));
        }

        // 配置用户代理
        if let Some(ref agent) = config.agent {
            client_builder = client_builder.user_agent(agent);
        }

        let client = client_builder
            .build()
            .map_err(|e| AppError::HttpClient(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            attempt_timeout: Duration::from_secs(config.request_timeout),
        })
    }

    // 发送请求并读取响应体
    async fn execute(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        // 检查状态码
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                code: status.as_u16(),
                body_snippet: snippet(&text),
            });
        }

        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Upstream for HttpClient {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let label = upstream_label(&request.url);
        debug!("Sending {} request to upstream {}", request.method, request.url);

        METRICS
            .upstream_requests_total()
            .with_label_values(&[label.as_str()])
            .inc();

        let start_time = Instant::now();

        let result = match tokio::time::timeout(self.attempt_timeout, self.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.attempt_timeout)),
        };

        match &result {
            Ok(_) => {
                METRICS
                    .upstream_duration_seconds()
                    .with_label_values(&[label.as_str()])
                    .observe(start_time.elapsed().as_secs_f64());
            }
            Err(e) => {
                debug!("Upstream request to {} failed: {}", label, e);
                METRICS
                    .upstream_errors_total()
                    .with_label_values(&[e.label(), label.as_str()])
                    .inc();
            }
        }

        result
    }
}

// 指标标签只使用主机名，避免路径和查询参数造成标签膨胀
fn upstream_label(url: &Url) -> String {
    url.host_str().unwrap_or("unknown").to_string()
}

// 截取错误响应体摘要
fn snippet(text: &str) -> String {
    text.chars()
        .take(http_client_limits::BODY_SNIPPET_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_truncates_long_bodies() {
        let long = "x".repeat(1000);
        assert_eq!(snippet(&long).len(), http_client_limits::BODY_SNIPPET_LEN);
        assert_eq!(snippet("  bad gateway \n"), "bad gateway");
    }

    #[test]
    fn test_upstream_label_uses_host() {
        let url = Url::parse("https://dns.google/resolve?name=example.com&type=A").unwrap();
        assert_eq!(upstream_label(&url), "dns.google");
    }

    #[test]
    fn test_client_creation_with_agent() {
        let config = HttpClientConfig {
            agent: Some("edgedoh-test".to_string()),
            ..HttpClientConfig::default()
        };
        assert!(HttpClient::new(&config).is_ok());
    }
}
