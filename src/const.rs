// 应用常量定义

//
// 配置参数限制常量
//

// 应用关闭等待时间限制
pub mod shutdown_timeout {
    // 默认值
    pub const DEFAULT: u64 = 30;
    // 最小值
    pub const MIN: u64 = 1;
    // 最大值
    pub const MAX: u64 = 120;
}

// HTTP客户端配置限制
pub mod http_client_limits {
    // 默认连接超时（秒）
    pub const DEFAULT_CONNECT_TIMEOUT: u64 = 3;
    // 最小连接超时（秒）
    pub const MIN_CONNECT_TIMEOUT: u64 = 1;
    // 最大连接超时（秒）
    pub const MAX_CONNECT_TIMEOUT: u64 = 120;
    // 默认单次上游请求超时（秒）
    pub const DEFAULT_REQUEST_TIMEOUT: u64 = 5;
    // 最小请求超时（秒）
    pub const MIN_REQUEST_TIMEOUT: u64 = 1;
    // 最大请求超时（秒）
    pub const MAX_REQUEST_TIMEOUT: u64 = 1200;
    // 默认空闲超时（秒）
    pub const DEFAULT_IDLE_TIMEOUT: u64 = 10;
    // 最小空闲超时（秒）
    pub const MIN_IDLE_TIMEOUT: u64 = 5;
    // 最大空闲超时（秒）
    pub const MAX_IDLE_TIMEOUT: u64 = 1800;
    // 默认keepalive时间（秒）
    pub const DEFAULT_KEEPALIVE: u32 = 30;
    // 最小keepalive时间（秒）
    pub const MIN_KEEPALIVE: u32 = 5;
    // 最大keepalive时间（秒）
    pub const MAX_KEEPALIVE: u32 = 600;
    // 错误响应体摘要的最大长度（字符）
    pub const BODY_SNIPPET_LEN: usize = 256;
}

//
// 指标标签常量
//

// 路由标签
pub mod route_labels {
    // 二进制 GET 转发
    pub const WIRE_GET: &str = "wire_get";
    // 二进制 POST 转发
    pub const WIRE_POST: &str = "wire_post";
    // 代理路径上的 JSON 查询
    pub const PROXY_JSON: &str = "proxy_json";
    // 结构化查询
    pub const STRUCTURED: &str = "structured";
    // 未匹配
    pub const UNMATCHED: &str = "unmatched";
}

// 错误类型标签
pub mod error_labels {
    // 错误的请求
    pub const BAD_REQUEST: &str = "bad_request";
    // 网络错误
    pub const NETWORK: &str = "network";
    // 上游状态码错误
    pub const UPSTREAM_STATUS: &str = "upstream_status";
    // 超时
    pub const TIMEOUT: &str = "timeout";
    // 响应解析错误
    pub const PARSE: &str = "parse";
    // 所有候选格式均失败
    pub const EXHAUSTED: &str = "candidates_exhausted";
    // 内部错误
    pub const INTERNAL: &str = "internal";
}

// 协商结果标签
pub mod outcome_labels {
    // 成功
    pub const SUCCESS: &str = "success";
    // 失败
    pub const FAILURE: &str = "failure";
}

// 子系统名称
pub mod subsystem_names {
    // 管理服务器子系统
    pub const ADMIN_SERVER: &str = "admin_server";
    // DoH服务器子系统
    pub const DOH_SERVER: &str = "doh_server";
}

// 服务器默认值
pub mod server_defaults {
    // 默认HTTP监听地址
    pub const DEFAULT_HTTP_LISTEN: &str = "0.0.0.0:8080";
    // 默认管理服务器监听地址
    pub const DEFAULT_ADMIN_LISTEN: &str = "127.0.0.1:9000";
    // 默认代理路径
    pub const DEFAULT_PROXY_PATH: &str = "/dns-query";
}

// 上游默认值
pub mod upstream_defaults {
    // 二进制格式（RFC 8484）上游
    pub const DEFAULT_WIRE_URL: &str = "https://dns.google/dns-query";
    // JSON 格式主上游
    pub const DEFAULT_JSON_URL: &str = "https://cloudflare-dns.com/dns-query";
    // JSON 格式备用上游
    pub const DEFAULT_JSON_FALLBACK_URL: &str = "https://dns.google/resolve";
}

// 查询参数常量
pub mod query_params {
    // 查询名称
    pub const NAME: &str = "name";
    // 查询类型
    pub const TYPE: &str = "type";
    // 查询域名（结构化查询）
    pub const DOMAIN: &str = "domain";
    // 目标 DoH 服务（结构化查询）
    pub const DOH: &str = "doh";
    // RFC 8484 GET 请求中的 DNS 消息
    pub const DNS: &str = "dns";

    // 默认值
    pub mod defaults {
        // 结构化查询的默认域名
        pub const DOMAIN: &str = "www.google.com";
        // 结构化查询的默认类型
        pub const STRUCTURED_TYPE: &str = "all";
        // 代理路径 JSON 查询的默认类型
        pub const PROXY_TYPE: &str = "A";
        // 聚合查询类型
        pub const ALL: &str = "all";
    }
}

// HTTP头常量
pub mod http_headers {
    // 内容类型常量
    pub mod content_types {
        // DNS消息内容类型
        pub const DNS_MESSAGE: &str = "application/dns-message";
        // DNS JSON内容类型
        pub const DNS_JSON: &str = "application/dns-json";
        // 通用JSON内容类型
        pub const JSON: &str = "application/json";
        // JSON 响应内容类型
        pub const JSON_UTF8: &str = "application/json; charset=UTF-8";
        // 纯文本内容类型
        pub const TEXT_UTF8: &str = "text/plain; charset=UTF-8";
    }

    // 协商时使用的描述性 User-Agent
    pub const NEGOTIATION_USER_AGENT: &str = concat!(
        "edgedoh/",
        env!("CARGO_PKG_VERSION"),
        " (DNS-over-HTTPS forwarding proxy)"
    );

    // CORS 预检缓存时间（秒）
    pub const CORS_MAX_AGE: u64 = 86400;
}
