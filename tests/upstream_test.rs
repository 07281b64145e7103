use assert_matches::assert_matches;
use bytes::Bytes;
use edgedoh::config::HttpClientConfig;
use edgedoh::error::UpstreamError;
use edgedoh::upstream::{
    FormatNegotiator, HttpClient, MultiRecordAggregator, ResolveRequest, Upstream,
    UpstreamRequest,
};
use hickory_proto::rr::RecordType;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_bytes, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

// 创建JSON响应辅助函数
fn create_test_json_response(name: &str, rtype: u16, data: &[&str]) -> String {
    let answers = data
        .iter()
        .map(|d| format!(r#"{{"name": "{}.", "type": {}, "TTL": 300, "data": "{}"}}"#, name, rtype, d))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        r#"{{
        "Status": 0,
        "TC": false,
        "RD": true,
        "RA": true,
        "AD": false,
        "CD": false,
        "Question": [{{"name": "{}.", "type": {}}}],
        "Answer": [{}]
    }}"#,
        name, rtype, answers
    )
}

fn create_client() -> Arc<dyn Upstream> {
    Arc::new(HttpClient::new(&HttpClientConfig::default()).unwrap())
}

fn base_url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

// 测试二进制请求原样透传
#[tokio::test]
async fn test_http_client_post_passthrough() {
    let mock_server = MockServer::start().await;
    let query = vec![0x12u8, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    let answer = vec![0x12u8, 0x34, 0x81, 0x80];

    Mock::given(method("POST"))
        .and(path("/dns-query"))
        .and(header("content-type", "application/dns-message"))
        .and(body_bytes(query.clone()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/dns-message")
                .set_body_bytes(answer.clone()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(
        "content-type",
        HeaderValue::from_static("application/dns-message"),
    );

    let client = create_client();
    let response = client
        .send(UpstreamRequest::post(
            base_url(&mock_server, "/dns-query"),
            headers,
            Bytes::from(query),
        ))
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.body.as_ref(), answer.as_slice());
}

// 测试非 2xx 状态码
#[tokio::test]
async fn test_http_client_non_success_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dns-query"))
        .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
        .mount(&mock_server)
        .await;

    let client = create_client();
    let result = client
        .send(UpstreamRequest::get(
            base_url(&mock_server, "/dns-query"),
            HeaderMap::new(),
        ))
        .await;

    assert_matches!(
        result,
        Err(UpstreamError::Status { code: 503, body_snippet }) if body_snippet == "service unavailable"
    );
}

// 测试单次请求超时
#[tokio::test]
async fn test_http_client_attempt_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig {
        request_timeout: 1,
        ..HttpClientConfig::default()
    };
    let client = HttpClient::new(&config).unwrap();

    let result = client
        .send(UpstreamRequest::get(
            base_url(&mock_server, "/slow"),
            HeaderMap::new(),
        ))
        .await;

    assert_matches!(result, Err(UpstreamError::Timeout(d)) if d == Duration::from_secs(1));
}

// 测试首选格式成功时只发出一次请求
#[tokio::test]
async fn test_negotiator_first_candidate_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/resolve"))
        .and(query_param("name", "example.com"))
        .and(query_param("type", "A"))
        .and(header("accept", "application/dns-json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/dns-json")
                .set_body_string(create_test_json_response("example.com", 1, &["93.184.216.34"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let negotiator = FormatNegotiator::new(create_client());
    let request = ResolveRequest::new(
        "example.com",
        RecordType::A,
        base_url(&mock_server, "/resolve"),
    );

    let answer = negotiator.resolve(&request).await.unwrap();
    assert_eq!(answer.question[0].name(), Some("example.com."));
    assert_eq!(answer.answer.len(), 1);
    assert_eq!(answer.answer[0].data(), Some("93.184.216.34"));
}

// 测试首选格式被拒绝后改用第二个候选（不带 dns-json Accept 头）
#[tokio::test]
async fn test_negotiator_falls_back_after_rejected_accept() {
    let mock_server = MockServer::start().await;

    // 先注册的模拟优先匹配
    Mock::given(method("GET"))
        .and(header("accept", "application/dns-json"))
        .respond_with(ResponseTemplate::new(415).set_body_string("unsupported accept"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/resolve"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(create_test_json_response("example.org", 28, &["2001:db8::1"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let negotiator = FormatNegotiator::new(create_client());
    let request = ResolveRequest::new(
        "example.org",
        RecordType::AAAA,
        base_url(&mock_server, "/resolve"),
    );

    let answer = negotiator.resolve(&request).await.unwrap();
    assert_eq!(answer.answer[0].data(), Some("2001:db8::1"));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_ne!(
        requests[1].headers.get(ACCEPT).map(|v| v.as_bytes()),
        Some(b"application/dns-json".as_slice())
    );
}

// 测试非 JSON 内容类型但响应体是 JSON 时仍然解析成功
#[tokio::test]
async fn test_negotiator_best_effort_parse() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string(create_test_json_response("example.net", 1, &["192.0.2.7"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let negotiator = FormatNegotiator::new(create_client());
    let request = ResolveRequest::new(
        "example.net",
        RecordType::A,
        base_url(&mock_server, "/resolve"),
    );

    let answer = negotiator.resolve(&request).await.unwrap();
    assert_eq!(answer.answer[0].data(), Some("192.0.2.7"));
}

// 测试所有候选失败
#[tokio::test]
async fn test_negotiator_all_candidates_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(4)
        .mount(&mock_server)
        .await;

    let negotiator = FormatNegotiator::new(create_client());
    let request = ResolveRequest::new(
        "example.com",
        RecordType::A,
        base_url(&mock_server, "/resolve"),
    );

    let result = negotiator.resolve(&request).await;
    assert_matches!(
        result,
        Err(UpstreamError::AllCandidatesExhausted { last_error, trace }) => {
            assert!(last_error.contains("502"));
            assert_eq!(trace.lines().count(), 4);
        }
    );
}

// 测试 A/AAAA/NS 并发聚合
#[tokio::test]
async fn test_aggregator_merges_three_queries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/resolve"))
        .and(query_param("type", "A"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/dns-json")
                .set_body_string(create_test_json_response(
                    "example.com",
                    1,
                    &["192.0.2.1", "192.0.2.2"],
                )),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/resolve"))
        .and(query_param("type", "AAAA"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/dns-json")
                .set_body_string(create_test_json_response("example.com", 28, &["2001:db8::1"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let ns_body = r#"{
        "Status": 0,
        "TC": false,
        "RD": true,
        "RA": true,
        "AD": true,
        "CD": false,
        "Question": {"name": "example.com.", "type": 2},
        "Answer": [{"name": "example.com.", "type": 2, "TTL": 3600, "data": "a.iana-servers.net."}],
        "Authority": [
            {"name": "example.com.", "type": 6, "TTL": 3600, "data": "ns.icann.org. noc.dns.icann.org. 1 7200 3600 1209600 3600"}
        ]
    }"#;

    Mock::given(method("GET"))
        .and(path("/resolve"))
        .and(query_param("type", "NS"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/dns-json")
                .set_body_string(ns_body),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let aggregator = MultiRecordAggregator::new(FormatNegotiator::new(create_client()));
    let result = aggregator
        .resolve_all("example.com", &base_url(&mock_server, "/resolve"))
        .await
        .unwrap();

    assert_eq!(result.status, 0);
    assert!(result.rd);
    assert!(result.ra);
    // 只有 NS 子查询置位 AD
    assert!(result.ad);
    assert!(!result.tc);
    assert_eq!(result.question.len(), 3);

    // A(2) + AAAA(1) + NS(1) + Authority SOA(1)
    assert_eq!(result.answer.len(), 5);
    assert_eq!(result.ipv4.records.len(), 2);
    assert_eq!(result.ipv6.records.len(), 1);
    assert_eq!(result.ns.records.len(), 2);
    assert_eq!(result.ns.records[1].rtype, 6);
}

// 测试任一子查询失败时聚合整体失败
#[tokio::test]
async fn test_aggregator_fails_when_one_query_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("type", "AAAA"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/dns-json")
                .set_body_string(create_test_json_response("example.com", 1, &["192.0.2.1"])),
        )
        .mount(&mock_server)
        .await;

    let aggregator = MultiRecordAggregator::new(FormatNegotiator::new(create_client()));
    let result = aggregator
        .resolve_all("example.com", &base_url(&mock_server, "/resolve"))
        .await;

    assert_matches!(result, Err(UpstreamError::AllCandidatesExhausted { .. }));
}

// 测试三路子查询并发执行：总耗时接近单次延迟而不是三倍
#[tokio::test]
async fn test_aggregator_runs_sub_queries_concurrently() {
    let mock_server = MockServer::start().await;
    let delay = Duration::from_millis(800);

    for (rtype, code, data) in [("A", 1, "192.0.2.1"), ("AAAA", 28, "2001:db8::1"), ("NS", 2, "ns1.example.com.")] {
        Mock::given(method("GET"))
            .and(path("/resolve"))
            .and(query_param("type", rtype))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/dns-json")
                    .set_body_string(create_test_json_response("example.com", code, &[data]))
                    .set_delay(delay),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let aggregator = MultiRecordAggregator::new(FormatNegotiator::new(create_client()));
    let started = std::time::Instant::now();
    let result = aggregator
        .resolve_all("example.com", &base_url(&mock_server, "/resolve"))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.answer.len(), 3);
    assert!(
        elapsed < delay * 2,
        "sub-queries ran sequentially: took {:?}",
        elapsed
    );
}
