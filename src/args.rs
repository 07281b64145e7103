use crate::error::AppError;
use crate::r#const::shutdown_timeout;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

// DNS-over-HTTPS 边缘转发代理
#[derive(Parser, Debug, Clone)]
#[command(
    name = "edgedoh",
    author,
    version,
    about = "An edge DNS-over-HTTPS forwarding proxy\n\n\
             Key Features:\n\
             - Wire-format passthrough: RFC 8484 GET/POST forwarded verbatim to an upstream DoH resolver\n\
             - JSON queries: name/type lookups with ordered Accept-header fallback negotiation\n\
             - Aggregation: type=all fans out A, AAAA and NS queries concurrently and merges the answers\n\
             - Browser friendly: permissive CORS headers on every response\n\
             - Observability: Prometheus metrics and health check on a separate admin listener"
)]
pub struct Args {
    // 配置文件路径（可选，缺省使用内置默认配置）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    // 测试配置
    #[arg(
        short = 't',
        long = "test",
        action = ArgAction::SetTrue,
        help = "Test configuration file for validity and exit"
    )]
    pub test_config: bool,

    // 启用调试日志
    #[arg(
        short = 'd',
        long = "debug",
        action = ArgAction::SetTrue,
        help = "Enable debug level logging for detailed output"
    )]
    pub debug: bool,

    // 关闭超时
    #[arg(
        long = "shutdown-timeout",
        help = "Maximum time in seconds to wait for complete shutdown",
        default_value_t = shutdown_timeout::DEFAULT
    )]
    pub shutdown_timeout: u64,
}

impl Args {
    // 解析命令行参数
    pub fn parse_args() -> Self {
        Args::parse()
    }

    // 验证参数
    pub fn validation(&self) -> Result<(), AppError> {
        if self.shutdown_timeout < shutdown_timeout::MIN
            || self.shutdown_timeout > shutdown_timeout::MAX
        {
            return Err(AppError::InvalidShutdownTimeout);
        }
        Ok(())
    }
}
