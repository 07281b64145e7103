use crate::error::ConfigError;
use crate::r#const::upstream_defaults;
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use super::{validate_url, ConfigResult};

// 上游 DoH 服务配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct UpstreamConfig {
    // 二进制格式（application/dns-message）上游地址
    #[serde(default = "default_wire_url")]
    #[validate(custom(function = "validate_url"))]
    pub wire_url: String,
    // JSON 格式主上游地址，同时作为结构化查询的内置上游
    #[serde(default = "default_json_url")]
    #[validate(custom(function = "validate_url"))]
    pub json_url: String,
    // JSON 格式备用上游地址
    #[serde(default = "default_json_fallback_url")]
    #[validate(custom(function = "validate_url"))]
    pub json_fallback_url: String,
}

fn default_wire_url() -> String {
    upstream_defaults::DEFAULT_WIRE_URL.to_string()
}

fn default_json_url() -> String {
    upstream_defaults::DEFAULT_JSON_URL.to_string()
}

fn default_json_fallback_url() -> String {
    upstream_defaults::DEFAULT_JSON_FALLBACK_URL.to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            wire_url: default_wire_url(),
            json_url: default_json_url(),
            json_fallback_url: default_json_fallback_url(),
        }
    }
}

/// 解析后的上游地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEndpoints {
    /// 二进制转发目标
    pub wire: Url,
    /// JSON 主上游
    pub json: Url,
    /// JSON 备用上游
    pub json_fallback: Url,
}

impl UpstreamEndpoints {
    pub fn from_config(config: &UpstreamConfig) -> ConfigResult<Self> {
        Ok(Self {
            wire: parse_upstream_url(&config.wire_url)?,
            json: parse_upstream_url(&config.json_url)?,
            json_fallback: parse_upstream_url(&config.json_fallback_url)?,
        })
    }
}

// 仅允许 http/https 上游
fn parse_upstream_url(raw: &str) -> ConfigResult<Url> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUpstreamUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::InvalidUpstreamUrl(format!(
            "{}: unsupported scheme '{}'",
            raw, scheme
        ))),
    }
}
