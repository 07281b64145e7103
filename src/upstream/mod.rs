// 声明子模块
mod aggregator;
mod http_client;
mod json;
mod negotiator;

// 重导出公共API
pub use aggregator::{first_truthy, merge, reduce_header, MergedHeader, MultiRecordAggregator, Truthy};
pub use http_client::{HttpClient, Upstream, UpstreamRequest, UpstreamResponse};
pub use json::{AggregatedResult, DnsAnswerRecord, DnsJsonResponse, DnsQuestion, RecordSection};
pub use negotiator::{candidates, FormatNegotiator, QueryType, ResolveRequest, UpstreamAttempt};
