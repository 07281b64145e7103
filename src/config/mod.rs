use crate::error::ConfigError;
use crate::r#const::http_client_limits;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, net::SocketAddr, path::Path, str::FromStr};
use tracing::debug;
use url::Url;
use validator::{Validate, ValidationError, ValidationErrors};

pub mod core;
pub mod upstream;

pub use core::*;
pub use upstream::*;

// 配置结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;

// 自定义验证函数 - 验证Socket地址格式
pub fn validate_socket_addr(addr: &str) -> Result<(), ValidationError> {
    match SocketAddr::from_str(addr) {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("invalid_socket_addr")),
    }
}

// 自定义验证函数 - 验证URL格式
pub fn validate_url(url_str: &str) -> Result<(), ValidationError> {
    match Url::parse(url_str) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("invalid_url")),
    }
}

// 检查单个代理路径：以 '/' 开头的静态路径，不含路由捕获语法
pub fn check_proxy_path(path: &str) -> ConfigResult<()> {
    if !path.starts_with('/') || path.len() < 2 {
        return Err(ConfigError::InvalidProxyPath(format!(
            "{}: must start with '/' and name at least one segment",
            path
        )));
    }
    if path.contains('{') || path.contains('}') {
        return Err(ConfigError::InvalidProxyPath(format!(
            "{}: braces are not allowed",
            path
        )));
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(ConfigError::InvalidProxyPath(format!(
            "{}: segments must not start with ':' or '*'",
            path
        )));
    }
    Ok(())
}

// 自定义验证函数 - 验证代理路径：非空、合法、不重复
pub fn validate_proxy_paths(paths: &[String]) -> Result<(), ValidationError> {
    if paths.is_empty() {
        return Err(ValidationError::new("empty_proxy_paths"));
    }

    let mut seen = HashSet::new();
    for path in paths {
        if check_proxy_path(path).is_err() {
            return Err(ValidationError::new("invalid_proxy_path"));
        }
        if !seen.insert(path.as_str()) {
            return Err(ValidationError::new("duplicate_proxy_path"));
        }
    }
    Ok(())
}

// 自定义验证函数 - 验证服务器配置中的组合字段
pub fn validate_server_options(server: &ServerConfig) -> Result<(), ValidationError> {
    validate_proxy_paths(&server.proxy_paths)?;

    if let Some(redirect) = &server.fallback_redirect {
        validate_url(redirect)?;
    }

    if server.public_hosts.iter().any(|h| h.trim().is_empty()) {
        return Err(ValidationError::new("empty_public_host"));
    }
    Ok(())
}

// 自定义验证函数 - 验证空闲超时
pub fn validate_idle_timeout(idle_timeout: &Option<u64>) -> Result<(), ValidationError> {
    if let Some(timeout) = idle_timeout {
        if *timeout < http_client_limits::MIN_IDLE_TIMEOUT
            || *timeout > http_client_limits::MAX_IDLE_TIMEOUT
        {
            return Err(ValidationError::new("invalid_idle_timeout"));
        }
    }
    Ok(())
}

// 自定义验证函数 - 验证Keepalive
pub fn validate_keepalive(keepalive: &Option<u32>) -> Result<(), ValidationError> {
    if let Some(value) = keepalive {
        if *value < http_client_limits::MIN_KEEPALIVE || *value > http_client_limits::MAX_KEEPALIVE
        {
            return Err(ValidationError::new("invalid_keepalive"));
        }
    }
    Ok(())
}

// 自定义验证函数 - HTTP客户端可选字段
pub fn validate_http_client_options(config: &HttpClientConfig) -> Result<(), ValidationError> {
    validate_idle_timeout(&config.idle_timeout)?;
    validate_keepalive(&config.keepalive)
}

// 应用配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate, Default)]
#[serde(rename_all = "lowercase")]
pub struct Config {
    // 服务器配置
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    // 管理服务器配置（可选）
    #[serde(default)]
    #[validate(nested)]
    pub admin: Option<AdminConfig>,
    // HTTP客户端配置（可选）
    #[serde(default)]
    #[validate(nested)]
    pub http_client: Option<HttpClientConfig>,
    // 上游配置（可选）
    #[serde(default)]
    #[validate(nested)]
    pub upstream: Option<UpstreamConfig>,
}

impl Config {
    // 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        debug!("Loading configuration file: {:?}", path.as_ref());
        let content = fs::read_to_string(path).map_err(ConfigError::LoadError)?;
        Self::from_yaml(&content)
    }

    // 从 YAML 文本加载配置
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        let config: Config = serde_yaml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    // 验证配置有效性
    pub fn validate(&self) -> ConfigResult<()> {
        // 代理路径会直接注册为路由，非法路径在这里给出具体原因
        for path in &self.server.proxy_paths {
            check_proxy_path(path)?;
        }

        // 使用 validator 库进行验证
        if let Err(errors) = Validate::validate(self) {
            return Err(ConfigError::ValidationError(format_validation_errors(
                &errors,
            )));
        }
        Ok(())
    }

    // 上游配置，未配置时使用默认值
    pub fn upstream_or_default(&self) -> UpstreamConfig {
        self.upstream.clone().unwrap_or_default()
    }

    // HTTP客户端配置，未配置时使用默认值
    pub fn http_client_or_default(&self) -> HttpClientConfig {
        self.http_client.clone().unwrap_or_default()
    }
}

// 将 ValidationErrors 转换为友好的错误信息
fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    // 格式化字段错误
    for (field, error_kind) in errors.errors() {
        match error_kind {
            validator::ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    messages.push(format!("Field '{}': {}", field, message));
                }
            }
            validator::ValidationErrorsKind::Struct(struct_errors) => {
                messages.push(format!(
                    "Struct '{}' validation failed: {}",
                    field,
                    format_validation_errors(struct_errors)
                ));
            }
            validator::ValidationErrorsKind::List(list_errors) => {
                for (index, err) in list_errors {
                    messages.push(format!(
                        "List '{}' at index {}: {}",
                        field,
                        index,
                        format_validation_errors(err)
                    ));
                }
            }
        }
    }

    if messages.is_empty() {
        "Unknown validation error".to_string()
    } else {
        messages.join("\n")
    }
}
