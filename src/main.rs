use edgedoh::{
    config::{AdminConfig, UpstreamEndpoints},
    subsystem_names, AdminServer, AppError, AppState, Args, Config, DoHServer, HttpClient,
    Upstream,
};
use mimalloc::MiMalloc;
use std::process;
use std::sync::Arc;
use tokio_graceful_shutdown::{IntoSubsystem, SubsystemBuilder, Toplevel};
use tracing::{error, info, warn};

// 使用 mimalloc 分配器提高内存效率
#[global_allocator]
static GLOBAL: MiMalloc = mimalloc::MiMalloc;

fn init_logging(args: &Args) {
    let builder = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_line_number(false);

    // 如果启用调试模式，输出调试信息，否则只输出 info 及以上级别
    if args.debug {
        builder.with_max_level(tracing::Level::DEBUG)
    } else {
        builder.with_max_level(tracing::Level::INFO)
    }
    .init();
}

// 程序入口
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 解析命令行参数
    let args = Args::parse_args();

    // 初始化日志
    init_logging(&args);

    // 验证参数
    if let Err(e) = args.validation() {
        error!("Invalid command line arguments: {}", e);
        process::exit(1);
    }

    info!("Starting edgedoh DNS-over-HTTPS forwarding proxy");

    // 加载配置
    let config = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => {
                info!("Successfully loaded configuration: {:?}", path);
                config
            }
            Err(e) => {
                error!("Failed to load configuration file: {}", e);
                process::exit(1);
            }
        },
        None => {
            info!("No configuration file given, using built-in defaults");
            Config::default()
        }
    };

    // 如果是测试模式，成功验证配置后退出
    if args.test_config {
        info!("Configuration file validation successful");
        return Ok(());
    }

    // 创建应用组件
    let components = match create_components(config) {
        Ok(components) => components,
        Err(e) => {
            error!("Failed to create application components: {}", e);
            process::exit(1);
        }
    };

    // 创建优雅关闭顶层管理器
    let toplevel = Toplevel::new(|s| async move {
        // 启动DoH服务器子系统
        let doh_server = components.doh_server;
        s.start(SubsystemBuilder::new(
            subsystem_names::DOH_SERVER,
            move |s| async move { doh_server.run(s).await },
        ));
        // 启动管理服务器子系统
        let admin_server = components.admin_server;
        s.start(SubsystemBuilder::new(
            subsystem_names::ADMIN_SERVER,
            move |s| async move { admin_server.run(s).await },
        ));
    });

    // 等待关闭
    info!("All services started, waiting for requests...");
    match toplevel
        .catch_signals()
        .handle_shutdown_requests(tokio::time::Duration::from_secs(args.shutdown_timeout))
        .await
    {
        Ok(_) => {
            info!("Application gracefully shut down");
            Ok(())
        }
        Err(e) => {
            error!("Application shutdown error: {}", e);
            process::exit(1);
        }
    }
}

// 应用组件
struct AppComponents {
    // DoH 服务器
    doh_server: DoHServer,
    // 管理服务器
    admin_server: AdminServer,
}

// 创建应用组件
fn create_components(config: Config) -> Result<AppComponents, AppError> {
    // 创建上游HTTP客户端
    let http_client_config = config.http_client_or_default();
    let upstream: Arc<dyn Upstream> = Arc::new(HttpClient::new(&http_client_config)?);
    info!(
        "Upstream HTTP client initialized, per-attempt timeout: {}s",
        http_client_config.request_timeout
    );

    // 解析上游地址
    let endpoints = UpstreamEndpoints::from_config(&config.upstream_or_default())?;

    // 创建应用状态
    let state = AppState::new(upstream, endpoints, &config.server)?;

    // 创建 DoH 服务器
    let doh_server = DoHServer::new(config.server.listen_http.parse()?, state);

    // 创建管理服务器
    let admin_config = match &config.admin {
        Some(admin_config) => admin_config.clone(),
        None => {
            warn!("Admin server configuration not provided, using default listen address");
            AdminConfig::default()
        }
    };
    let admin_server = AdminServer::new(admin_config.listen.parse()?);
    info!("Admin server will listen on {}", admin_config.listen);

    info!(
        "DoH server initialized with HTTP: {}, proxy paths: {:?}",
        config.server.listen_http, config.server.proxy_paths
    );

    // 返回应用组件
    Ok(AppComponents {
        doh_server,
        admin_server,
    })
}
