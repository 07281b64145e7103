use crate::r#const::{http_client_limits, server_defaults};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{validate_http_client_options, validate_server_options, validate_socket_addr};

// HTTP客户端配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
#[validate(schema(function = "validate_http_client_options"))]
pub struct HttpClientConfig {
    // 连接超时（秒）
    #[serde(default = "default_connect_timeout")]
    #[validate(range(
        min = http_client_limits::MIN_CONNECT_TIMEOUT,
        max = http_client_limits::MAX_CONNECT_TIMEOUT,
        message = "Connect timeout out of range"
    ))]
    pub connect_timeout: u64,
    // 单次上游请求超时（秒）
    #[serde(default = "default_request_timeout")]
    #[validate(range(
        min = http_client_limits::MIN_REQUEST_TIMEOUT,
        max = http_client_limits::MAX_REQUEST_TIMEOUT,
        message = "Request timeout out of range"
    ))]
    pub request_timeout: u64,
    // 空闲连接超时（秒）（可选）
    pub idle_timeout: Option<u64>,
    // TCP Keepalive（秒）（可选）
    pub keepalive: Option<u32>,
    // HTTP用户代理（可选）
    pub agent: Option<String>,
}

fn default_connect_timeout() -> u64 {
    http_client_limits::DEFAULT_CONNECT_TIMEOUT
}

fn default_request_timeout() -> u64 {
    http_client_limits::DEFAULT_REQUEST_TIMEOUT
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            idle_timeout: Some(http_client_limits::DEFAULT_IDLE_TIMEOUT),
            keepalive: Some(http_client_limits::DEFAULT_KEEPALIVE),
            agent: None,
        }
    }
}

// 服务器配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
#[validate(schema(function = "validate_server_options"))]
pub struct ServerConfig {
    // HTTP监听地址
    #[serde(default = "default_http_listen")]
    #[validate(custom(function = "validate_socket_addr"))]
    pub listen_http: String,
    // 二进制 DoH 代理路径（第一个为主路径，其余为别名）
    #[serde(default = "default_proxy_paths")]
    pub proxy_paths: Vec<String>,
    // 标识本服务的主机名，用于识别指向自身的 doh 参数
    #[serde(default)]
    pub public_hosts: Vec<String>,
    // 未匹配请求的重定向地址（可选，缺省返回 404）
    #[serde(default)]
    pub fallback_redirect: Option<String>,
}

fn default_http_listen() -> String {
    server_defaults::DEFAULT_HTTP_LISTEN.to_string()
}

fn default_proxy_paths() -> Vec<String> {
    vec![server_defaults::DEFAULT_PROXY_PATH.to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_http: default_http_listen(),
            proxy_paths: default_proxy_paths(),
            public_hosts: Vec::new(),
            fallback_redirect: None,
        }
    }
}

// 管理服务器配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct AdminConfig {
    // 管理服务器监听地址
    #[validate(custom(function = "validate_socket_addr"))]
    pub listen: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen: server_defaults::DEFAULT_ADMIN_LISTEN.to_string(),
        }
    }
}
