use crate::metrics::METRICS;
use crate::r#const::{error_labels, http_headers};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::error::Error as _;
use std::io;
use std::net::AddrParseError;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

// Unified error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("JSON serialization/deserialization error: {0}")]
    JsonError(String),

    #[error("Invalid shutdown timeout")]
    InvalidShutdownTimeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<AddrParseError> for AppError {
    fn from(err: AddrParseError) -> Self {
        Self::Config(ConfigError::InvalidListenAddress(err.to_string()))
    }
}

impl AppError {
    // 错误类型指标标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => error_labels::BAD_REQUEST,
            Self::Upstream(e) => e.label(),
            _ => error_labels::INTERNAL,
        }
    }

    // 诊断信息：协商失败时为逐次尝试记录，其余情况为错误来源链
    pub fn stack(&self) -> String {
        if let Self::Upstream(UpstreamError::AllCandidatesExhausted { trace, .. }) = self {
            return trace.clone();
        }

        let mut lines = vec![self.to_string()];
        let mut source = self.source();
        while let Some(cause) = source {
            lines.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        lines.join("\n")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        METRICS
            .request_errors_total()
            .with_label_values(&[self.label()])
            .inc();

        // 请求参数错误以纯文本返回
        if let Self::BadRequest(message) = &self {
            return (
                StatusCode::BAD_REQUEST,
                [(
                    header::CONTENT_TYPE,
                    http_headers::content_types::TEXT_UTF8,
                )],
                message.clone(),
            )
                .into_response();
        }

        error!("Request failed: {}", self);

        let body = serde_json::json!({
            "error": self.to_string(),
            "stack": self.stack(),
        });

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(
                header::CONTENT_TYPE,
                http_headers::content_types::JSON_UTF8,
            )],
            body.to_string(),
        )
            .into_response()
    }
}

// 上游请求错误类型
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream server returned HTTP {code}: {body_snippet}")]
    Status { code: u16, body_snippet: String },

    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to parse upstream response: {0}")]
    Parse(String),

    #[error("All upstream format candidates failed, last error: {last_error}")]
    AllCandidatesExhausted { last_error: String, trace: String },
}

impl UpstreamError {
    // 错误类型指标标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network(_) => error_labels::NETWORK,
            Self::Status { .. } => error_labels::UPSTREAM_STATUS,
            Self::Timeout(_) => error_labels::TIMEOUT,
            Self::Parse(_) => error_labels::PARSE,
            Self::AllCandidatesExhausted { .. } => error_labels::EXHAUSTED,
        }
    }
}

// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadError(#[from] io::Error),

    #[error("YAML parsing error: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid server listen address: {0}")]
    InvalidListenAddress(String),

    #[error("Invalid upstream URL: {0}")]
    InvalidUpstreamUrl(String),

    #[error("Invalid proxy path: {0}")]
    InvalidProxyPath(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}
