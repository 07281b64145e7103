// src/doh/mod.rs
//
// DoH 转发代理的 HTTP 入口，支持:
// - RFC 8484: 二进制 DNS 消息，GET (dns 参数) 与 POST 原样转发
// - JSON 查询: 代理路径上的 name/type 参数，以及任意路径上的 doh/domain/type 结构化查询
// - type=all: A/AAAA/NS 三路并发查询后合并

// 子模块定义
pub mod handlers;
pub mod server;
pub mod state;

// 公开导出
pub use server::{create_router, DoHServer};
pub use state::AppState;
