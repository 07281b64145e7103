// src/upstream/negotiator.rs
//
// JSON 格式协商：按固定优先级依次尝试不同的 Accept/请求头组合，
// 直到某一次请求返回可解析的 JSON 应答。

use crate::error::UpstreamError;
use crate::metrics::METRICS;
use crate::r#const::{http_headers, outcome_labels, query_params};
use crate::upstream::http_client::{Upstream, UpstreamRequest, UpstreamResponse};
use crate::upstream::json::DnsJsonResponse;
use hickory_proto::rr::RecordType;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// 单次解析请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub domain: String,
    pub record_type: RecordType,
    pub upstream_base: Url,
}

impl ResolveRequest {
    pub fn new(domain: impl Into<String>, record_type: RecordType, upstream_base: Url) -> Self {
        Self {
            domain: domain.into(),
            record_type,
            upstream_base,
        }
    }

    // 构造 `upstream_base?name=<domain>&type=<type>`
    fn url(&self) -> Url {
        let mut url = self.upstream_base.clone();
        url.query_pairs_mut()
            .append_pair(query_params::NAME, &self.domain)
            .append_pair(query_params::TYPE, &type_param(self.record_type));
        url
    }
}

/// 查询类型参数：单一记录类型，或 `all` 聚合查询
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    All,
    Single(RecordType),
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(query_params::defaults::ALL) {
            return Ok(Self::All);
        }
        if let Ok(code) = s.parse::<u16>() {
            return Ok(Self::Single(RecordType::from(code)));
        }
        RecordType::from_str(&s.to_ascii_uppercase())
            .map(Self::Single)
            .map_err(|_| format!("Unsupported record type: {}", s))
    }
}

// 上游 type 参数：已知类型用助记符，未知类型用数字
fn type_param(record_type: RecordType) -> String {
    match record_type {
        RecordType::Unknown(code) => code.to_string(),
        other => other.to_string(),
    }
}

/// 一次协商尝试使用的请求头组合
#[derive(Debug, Clone)]
pub struct UpstreamAttempt {
    pub label: &'static str,
    pub headers: HeaderMap,
}

// 按优先级排列的候选请求头，每次协商重新构建
pub fn candidates() -> Vec<UpstreamAttempt> {
    let dns_json = HeaderValue::from_static(http_headers::content_types::DNS_JSON);

    let mut accept_dns_json = HeaderMap::new();
    accept_dns_json.insert(ACCEPT, dns_json.clone());

    let mut accept_json = HeaderMap::new();
    accept_json.insert(
        ACCEPT,
        HeaderValue::from_static(http_headers::content_types::JSON),
    );

    let mut with_agent = HeaderMap::new();
    with_agent.insert(ACCEPT, dns_json);
    with_agent.insert(
        USER_AGENT,
        HeaderValue::from_static(http_headers::NEGOTIATION_USER_AGENT),
    );

    vec![
        UpstreamAttempt {
            label: "accept_dns_json",
            headers: accept_dns_json,
        },
        UpstreamAttempt {
            label: "no_accept",
            headers: HeaderMap::new(),
        },
        UpstreamAttempt {
            label: "accept_json",
            headers: accept_json,
        },
        UpstreamAttempt {
            label: "dns_json_with_agent",
            headers: with_agent,
        },
    ]
}

// 解析应答体：声明为 JSON 的直接解析，否则尽力按 JSON 解析文本
fn parse_body(response: &UpstreamResponse) -> Result<DnsJsonResponse, UpstreamError> {
    let content_type = response
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.contains("json") {
        return serde_json::from_slice(&response.body)
            .map_err(|e| UpstreamError::Parse(format!("invalid JSON body: {}", e)));
    }

    let text = String::from_utf8_lossy(&response.body);
    serde_json::from_str(text.trim()).map_err(|e| {
        UpstreamError::Parse(format!(
            "response declared as '{}' is not JSON: {}",
            content_type, e
        ))
    })
}

/// 格式协商器
#[derive(Clone)]
pub struct FormatNegotiator {
    upstream: Arc<dyn Upstream>,
}

impl FormatNegotiator {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// 依次尝试各候选请求头，返回第一个成功解析的应答
    ///
    /// 候选之间严格串行；任一失败（状态码、网络、超时、解析）都会记录并继续下一个。
    /// 全部失败时返回 `AllCandidatesExhausted`，其中 `trace` 逐行记录每次尝试的失败原因。
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<DnsJsonResponse, UpstreamError> {
        let url = request.url();
        let mut trace = Vec::new();
        let mut last_error: Option<UpstreamError> = None;

        for (index, attempt) in candidates().into_iter().enumerate() {
            debug!(
                "Negotiating {} {} with candidate #{} ({})",
                request.domain,
                request.record_type,
                index + 1,
                attempt.label
            );

            let result = self
                .upstream
                .send(UpstreamRequest::get(url.clone(), attempt.headers))
                .await
                .and_then(|response| parse_body(&response));

            match result {
                Ok(answer) => {
                    METRICS
                        .negotiation_attempts_total()
                        .with_label_values(&[attempt.label, outcome_labels::SUCCESS])
                        .inc();
                    return Ok(answer);
                }
                Err(e) => {
                    METRICS
                        .negotiation_attempts_total()
                        .with_label_values(&[attempt.label, outcome_labels::FAILURE])
                        .inc();
                    warn!(
                        "Candidate #{} ({}) failed for {} {}: {}",
                        index + 1,
                        attempt.label,
                        request.domain,
                        request.record_type,
                        e
                    );
                    trace.push(format!("attempt {} ({}): {}", index + 1, attempt.label, e));
                    last_error = Some(e);
                }
            }
        }

        Err(UpstreamError::AllCandidatesExhausted {
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no candidates attempted".to_string()),
            trace: trace.join("\n"),
        })
    }
}
