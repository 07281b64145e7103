// src/doh/state.rs

use crate::config::{ServerConfig, UpstreamEndpoints};
use crate::doh::handlers::host_of;
use crate::error::{AppError, ConfigError};
use crate::upstream::{FormatNegotiator, MultiRecordAggregator, Upstream};
use std::sync::Arc;
use url::Url;

/// 应用程序状态结构体
#[derive(Clone)]
pub struct AppState {
    /// 上游传输层（二进制透传直接使用）
    pub upstream: Arc<dyn Upstream>,
    /// JSON 格式协商器
    pub negotiator: FormatNegotiator,
    /// A/AAAA/NS 聚合器
    pub aggregator: MultiRecordAggregator,
    /// 上游地址
    pub endpoints: Arc<UpstreamEndpoints>,
    /// 二进制 DoH 代理路径
    pub proxy_paths: Arc<Vec<String>>,
    /// 标识本服务的主机名（小写，不含端口）
    pub public_hosts: Arc<Vec<String>>,
    /// 未匹配请求的重定向地址
    pub fallback_redirect: Option<Url>,
}

impl AppState {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        endpoints: UpstreamEndpoints,
        server: &ServerConfig,
    ) -> Result<Self, AppError> {
        let negotiator = FormatNegotiator::new(upstream.clone());
        let aggregator = MultiRecordAggregator::new(negotiator.clone());

        let fallback_redirect = match &server.fallback_redirect {
            Some(raw) => Some(Url::parse(raw).map_err(|e| {
                ConfigError::ValidationError(format!("Invalid fallback redirect {}: {}", raw, e))
            })?),
            None => None,
        };

        Ok(Self {
            upstream,
            negotiator,
            aggregator,
            endpoints: Arc::new(endpoints),
            proxy_paths: Arc::new(server.proxy_paths.clone()),
            public_hosts: Arc::new(
                server
                    .public_hosts
                    .iter()
                    .map(|h| host_of(h).unwrap_or_else(|| h.trim().to_ascii_lowercase()))
                    .collect(),
            ),
            fallback_redirect,
        })
    }
}
