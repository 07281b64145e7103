// src/doh/server.rs

use crate::doh::handlers::{handle_proxy, handle_query};
use crate::doh::state::AppState;
use crate::error::AppError;
use crate::r#const::http_headers;
use axum::{http::Method, routing::any, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_graceful_shutdown::SubsystemHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// DoH 服务器结构体
pub struct DoHServer {
    /// 监听地址
    bind_addr: SocketAddr,
    /// 应用状态
    state: AppState,
    /// 关闭信号发送端
    shutdown_tx: oneshot::Sender<()>,
    /// 关闭信号接收端
    shutdown_rx: oneshot::Receiver<()>,
}

/// CORS：预检请求在任意路径上直接返回 200，其余响应附加 `Access-Control-Allow-Origin: *`
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(http_headers::CORS_MAX_AGE))
}

/// 创建应用路由
///
/// 代理路径处理二进制与 JSON 查询，其余路径交给结构化查询处理。
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new();

    for path in state.proxy_paths.iter() {
        router = router.route(path, any(handle_proxy));
    }

    router
        .fallback(handle_query)
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

impl DoHServer {
    /// 创建新的 DoH 服务器
    pub fn new(bind_addr: SocketAddr, state: AppState) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        Self {
            bind_addr,
            state,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// 启动 DoH 服务器
    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), AppError> {
        info!(
            "DoH proxy paths: {:?}, upstreams: wire={}, json={}, json_fallback={}",
            self.state.proxy_paths,
            self.state.endpoints.wire,
            self.state.endpoints.json,
            self.state.endpoints.json_fallback
        );

        // 创建路由
        let app = create_router(self.state);

        // 创建 TCP 监听器
        let listener = match TcpListener::bind(self.bind_addr).await {
            Ok(listener) => {
                info!("DoH server listening on {}", self.bind_addr);
                listener
            }
            Err(e) => {
                error!("Failed to bind DoH server: {}", e);
                return Err(AppError::Io(e));
            }
        };

        // 获取关闭信号接收端
        let shutdown_rx = self.shutdown_rx;

        // 启动 HTTP 服务器
        tokio::select! {
            result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>()
            )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("DoH server received shutdown signal");
            }) => {
                match result {
                    Ok(()) => {
                        info!("DoH server completed normally");
                        Ok(())
                    }
                    Err(e) => {
                        error!("DoH server error: {}", e);
                        Err(AppError::Io(e))
                    }
                }
            }
            _ = subsys.on_shutdown_requested() => {
                info!("Shutdown requested, stopping DoH server");
                let _ = self.shutdown_tx.send(());
                Ok(())
            }
        }
    }
}
