// src/doh/handlers.rs

use crate::doh::state::AppState;
use crate::error::AppError;
use crate::metrics::METRICS;
use crate::r#const::{http_headers, query_params, route_labels};
use crate::upstream::{QueryType, ResolveRequest, UpstreamRequest, UpstreamResponse};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// 处理代理路径上的请求
///
/// - GET 带 `name`：JSON 查询，`type` 缺省为 A，主上游失败后改用备用上游
/// - GET 带 `dns`：原样转发查询字符串到二进制上游
/// - POST：原样转发请求体到二进制上游
pub async fn handle_proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, AppError> {
    match method {
        Method::GET => {
            let query = match uri.query() {
                Some(q) if !q.is_empty() => q,
                _ => {
                    return Err(AppError::BadRequest(
                        "Missing query string: expected a 'dns' or 'name' parameter".to_string(),
                    ))
                }
            };
            let params = parse_query(query);

            if let Some(name) = non_empty(&params, query_params::NAME) {
                let type_param =
                    non_empty(&params, query_params::TYPE).unwrap_or(query_params::defaults::PROXY_TYPE);
                return timed(route_labels::PROXY_JSON, proxy_json(&state, name, type_param)).await;
            }

            match params.get(query_params::DNS) {
                Some(dns) => {
                    validate_dns_param(dns)?;
                    timed(route_labels::WIRE_GET, forward_wire_get(&state, query)).await
                }
                None => Err(AppError::BadRequest(
                    "GET requests must carry either a 'dns' (base64url DNS message) or a 'name' parameter"
                        .to_string(),
                )),
            }
        }
        Method::POST => timed(route_labels::WIRE_POST, forward_wire_post(&state, body)).await,
        other => Err(AppError::BadRequest(format!(
            "Unsupported method {} for DNS query endpoint, expected GET or POST",
            other
        ))),
    }
}

/// 处理其他路径：带 `doh`/`domain`/`name` 参数时执行结构化查询，否则 404（或配置的重定向）
pub async fn handle_query(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let params = uri.query().map(parse_query).unwrap_or_default();

    let is_structured = [query_params::DOH, query_params::DOMAIN, query_params::NAME]
        .iter()
        .any(|key| params.contains_key(*key));

    if !is_structured {
        METRICS
            .http_requests_total()
            .with_label_values(&[route_labels::UNMATCHED])
            .inc();
        return Ok(unmatched(&state, &uri));
    }

    timed(
        route_labels::STRUCTURED,
        structured_query(&state, &params, &headers),
    )
    .await
}

// 结构化查询
async fn structured_query(
    state: &AppState,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let domain = non_empty(params, query_params::DOMAIN)
        .or_else(|| non_empty(params, query_params::NAME))
        .unwrap_or(query_params::defaults::DOMAIN);

    let query_type = parse_query_type(
        non_empty(params, query_params::TYPE).unwrap_or(query_params::defaults::STRUCTURED_TYPE),
    )?;

    let upstream_base = match non_empty(params, query_params::DOH) {
        None => state.endpoints.json.clone(),
        Some(raw) => {
            let target = parse_doh_target(raw)?;
            if is_own_host(&target, headers, &state.public_hosts) {
                // 指向自身时直接在本地解析，不再经 HTTP 回环
                debug!("DoH target {} points at this service, resolving locally", target);
                state.endpoints.json.clone()
            } else {
                target
            }
        }
    };

    debug!(
        "Structured query for {} ({:?}) via {}",
        domain, query_type, upstream_base
    );

    match query_type {
        QueryType::All => {
            let result = state.aggregator.resolve_all(domain, &upstream_base).await?;
            json_response(&result)
        }
        QueryType::Single(record_type) => {
            let request = ResolveRequest::new(domain, record_type, upstream_base);
            let answer = state.negotiator.resolve(&request).await?;
            json_response(&answer)
        }
    }
}

// 代理路径上的 JSON 查询：先主上游，失败后备用上游
async fn proxy_json(state: &AppState, name: &str, type_param: &str) -> Result<Response, AppError> {
    let query_type = parse_query_type(type_param)?;
    let primary = &state.endpoints.json;
    let secondary = &state.endpoints.json_fallback;

    match query_type {
        QueryType::Single(record_type) => {
            let request = ResolveRequest::new(name, record_type, primary.clone());
            match state.negotiator.resolve(&request).await {
                Ok(answer) => json_response(&answer),
                Err(e) => {
                    warn!(
                        "Primary upstream {} failed for {}: {}, trying {}",
                        primary, name, e, secondary
                    );
                    let request = ResolveRequest::new(name, record_type, secondary.clone());
                    let answer = state.negotiator.resolve(&request).await?;
                    json_response(&answer)
                }
            }
        }
        QueryType::All => match state.aggregator.resolve_all(name, primary).await {
            Ok(result) => json_response(&result),
            Err(e) => {
                warn!(
                    "Primary upstream {} failed for {}: {}, trying {}",
                    primary, name, e, secondary
                );
                let result = state.aggregator.resolve_all(name, secondary).await?;
                json_response(&result)
            }
        },
    }
}

// 二进制 GET：完整查询字符串原样转发
async fn forward_wire_get(state: &AppState, query: &str) -> Result<Response, AppError> {
    let mut url = state.endpoints.wire.clone();
    url.set_query(Some(query));

    let response = state
        .upstream
        .send(UpstreamRequest::get(url, wire_headers(false)))
        .await?;

    Ok(wire_response(response))
}

// 二进制 POST：请求体原样转发
async fn forward_wire_post(state: &AppState, body: Bytes) -> Result<Response, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest(
            "POST requests must carry a DNS message body".to_string(),
        ));
    }

    let response = state
        .upstream
        .send(UpstreamRequest::post(
            state.endpoints.wire.clone(),
            wire_headers(true),
            body,
        ))
        .await?;

    Ok(wire_response(response))
}

fn wire_headers(with_body: bool) -> HeaderMap {
    let dns_message = HeaderValue::from_static(http_headers::content_types::DNS_MESSAGE);
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, dns_message.clone());
    if with_body {
        headers.insert(header::CONTENT_TYPE, dns_message);
    }
    headers
}

// 透传上游应答体，保留上游声明的内容类型与缓存控制
fn wire_response(upstream: UpstreamResponse) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        upstream
            .headers
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(http_headers::content_types::DNS_MESSAGE)),
    );
    if let Some(cache_control) = upstream.headers.get(header::CACHE_CONTROL) {
        headers.insert(header::CACHE_CONTROL, cache_control.clone());
    }

    (upstream.status, headers, upstream.body).into_response()
}

fn json_response<T: Serialize>(value: &T) -> Result<Response, AppError> {
    let body = serde_json::to_vec(value)?;
    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            http_headers::content_types::JSON_UTF8,
        )],
        body,
    )
        .into_response())
}

fn unmatched(state: &AppState, uri: &Uri) -> Response {
    match &state.fallback_redirect {
        Some(target) => {
            debug!("Redirecting unmatched request {} to {}", uri, target);
            (StatusCode::FOUND, [(header::LOCATION, target.as_str())]).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            [(
                header::CONTENT_TYPE,
                http_headers::content_types::TEXT_UTF8,
            )],
            "Not Found",
        )
            .into_response(),
    }
}

// 记录请求计数与耗时
async fn timed<F>(route: &'static str, handler: F) -> Result<Response, AppError>
where
    F: Future<Output = Result<Response, AppError>>,
{
    METRICS
        .http_requests_total()
        .with_label_values(&[route])
        .inc();

    let start_time = Instant::now();
    let result = handler.await;
    let duration = start_time.elapsed();

    METRICS
        .http_request_duration_seconds()
        .with_label_values(&[route])
        .observe(duration.as_secs_f64());

    debug!("{} request processed in {:?}", route, duration);

    result
}

// 解析查询字符串，重复参数以第一次出现为准
fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}

fn non_empty<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_query_type(raw: &str) -> Result<QueryType, AppError> {
    raw.parse::<QueryType>().map_err(AppError::BadRequest)
}

fn validate_dns_param(dns: &str) -> Result<(), AppError> {
    match URL_SAFE_NO_PAD.decode(dns.trim_end_matches('=')) {
        Ok(bytes) if !bytes.is_empty() => Ok(()),
        Ok(_) => Err(AppError::BadRequest(
            "The 'dns' parameter is empty".to_string(),
        )),
        Err(e) => Err(AppError::BadRequest(format!(
            "The 'dns' parameter is not valid base64url: {}",
            e
        ))),
    }
}

fn parse_doh_target(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw)
        .map_err(|e| AppError::BadRequest(format!("Invalid 'doh' URL {}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(AppError::BadRequest(format!(
            "The 'doh' parameter must be an http(s) URL: {}",
            raw
        ))),
    }
}

// 目标主机是否为本服务：与入站 Host / X-Forwarded-Host 或配置的公开主机名比较
fn is_own_host(target: &Url, headers: &HeaderMap, public_hosts: &[String]) -> bool {
    let target_host = match target.host_str() {
        Some(host) => host.to_ascii_lowercase(),
        None => return false,
    };

    if public_hosts.iter().any(|h| *h == target_host) {
        return true;
    }

    [header::HOST.as_str(), "x-forwarded-host"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(host_of)
        .any(|host| host == target_host)
}

// 从 Host 头中取出主机名（去掉端口）
pub(crate) fn host_of(authority: &str) -> Option<String> {
    let authority = authority.split(',').next()?.trim();
    Url::parse(&format!("http://{}", authority))
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_first_value_wins() {
        let params = parse_query("name=example.com&type=AAAA&name=other.org");
        assert_eq!(params.get("name").unwrap(), "example.com");
        assert_eq!(params.get("type").unwrap(), "AAAA");
    }

    #[test]
    fn test_non_empty_skips_blank_values() {
        let params = parse_query("domain=&name=example.com");
        assert_eq!(non_empty(&params, "domain"), None);
        assert_eq!(non_empty(&params, "name"), Some("example.com"));
    }

    #[test]
    fn test_validate_dns_param() {
        // 一个最小的 DNS 查询头
        assert!(validate_dns_param("AAABAAABAAAAAAAA").is_ok());
        assert!(validate_dns_param("AAABAAABAAAAAAAA==").is_ok());
        assert!(validate_dns_param("not*base64").is_err());
        assert!(validate_dns_param("").is_err());
    }

    #[test]
    fn test_parse_doh_target() {
        assert!(parse_doh_target("https://dns.google/resolve").is_ok());
        assert!(parse_doh_target("ftp://dns.google/resolve").is_err());
        assert!(parse_doh_target("dns.google").is_err());
    }

    #[test]
    fn test_is_own_host_matches_host_header_without_port() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("Proxy.Example.net:8443"));
        let target = Url::parse("https://proxy.example.net/dns-query").unwrap();

        assert!(is_own_host(&target, &headers, &[]));
        assert!(!is_own_host(
            &Url::parse("https://dns.google/resolve").unwrap(),
            &headers,
            &[]
        ));
    }

    #[test]
    fn test_is_own_host_matches_public_hosts() {
        let target = Url::parse("https://doh.example.net/").unwrap();
        assert!(is_own_host(
            &target,
            &HeaderMap::new(),
            &["doh.example.net".to_string()]
        ));
    }

    #[test]
    fn test_is_own_host_uses_forwarded_host() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("10.0.0.5:8080"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("edge.example.net"));
        let target = Url::parse("https://edge.example.net/dns-query").unwrap();

        assert!(is_own_host(&target, &headers, &[]));
    }
}
