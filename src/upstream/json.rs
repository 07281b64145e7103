// src/upstream/json.rs
//
// JSON-DoH 应答模型（Status/Question/Answer 约定），以及 A/AAAA/NS 聚合结果。
// 除 `type` 外的记录字段均原样透传，不做语义校验。

use hickory_proto::rr::RecordType;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 查询问题
///
/// 只解释 `type`，其余字段（`name` 等）原样保存在 `rest` 中。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsQuestion {
    #[serde(rename = "type", default)]
    pub rtype: u16,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl DnsQuestion {
    pub fn name(&self) -> Option<&str> {
        self.rest.get("name").and_then(Value::as_str)
    }
}

/// 应答记录
///
/// 与 `DnsQuestion` 相同，`name`、`TTL`、`data` 以及上游附加的任何字段都不做解析，
/// 上游没有给出的字段也不会补齐。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsAnswerRecord {
    #[serde(rename = "type", default)]
    pub rtype: u16,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl DnsAnswerRecord {
    pub fn is_type(&self, record_type: RecordType) -> bool {
        self.rtype == u16::from(record_type)
    }

    pub fn name(&self) -> Option<&str> {
        self.rest.get("name").and_then(Value::as_str)
    }

    pub fn data(&self) -> Option<&str> {
        self.rest.get("data").and_then(Value::as_str)
    }
}

/// 上游返回的 JSON-DoH 应答
///
/// 标志位和 Status 缺失或为 null 时视为假值。`Question` 允许为单个对象，
/// 解析时统一为序列。未识别的字段保存在 `extra` 中并原样输出。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsJsonResponse {
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u32>,
    #[serde(rename = "TC", default, skip_serializing_if = "Option::is_none")]
    pub tc: Option<bool>,
    #[serde(rename = "RD", default, skip_serializing_if = "Option::is_none")]
    pub rd: Option<bool>,
    #[serde(rename = "RA", default, skip_serializing_if = "Option::is_none")]
    pub ra: Option<bool>,
    #[serde(rename = "AD", default, skip_serializing_if = "Option::is_none")]
    pub ad: Option<bool>,
    #[serde(rename = "CD", default, skip_serializing_if = "Option::is_none")]
    pub cd: Option<bool>,
    #[serde(
        rename = "Question",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub question: Vec<DnsQuestion>,
    #[serde(
        rename = "Answer",
        default,
        deserialize_with = "nullable_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub answer: Vec<DnsAnswerRecord>,
    #[serde(
        rename = "Authority",
        default,
        deserialize_with = "nullable_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub authority: Vec<DnsAnswerRecord>,
    #[serde(
        rename = "Additional",
        default,
        deserialize_with = "nullable_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub additional: Vec<DnsAnswerRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(item)) => vec![item],
        Some(OneOrMany::Many(items)) => items,
    })
}

fn nullable_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// 聚合结果中的分组视图
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordSection {
    pub records: Vec<DnsAnswerRecord>,
}

/// A/AAAA/NS 三路查询的合并结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedResult {
    #[serde(rename = "Status")]
    pub status: u32,
    #[serde(rename = "TC")]
    pub tc: bool,
    #[serde(rename = "RD")]
    pub rd: bool,
    #[serde(rename = "RA")]
    pub ra: bool,
    #[serde(rename = "AD")]
    pub ad: bool,
    #[serde(rename = "CD")]
    pub cd: bool,
    #[serde(rename = "Question")]
    pub question: Vec<DnsQuestion>,
    #[serde(rename = "Answer")]
    pub answer: Vec<DnsAnswerRecord>,
    pub ipv4: RecordSection,
    pub ipv6: RecordSection,
    pub ns: RecordSection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_google_style_response() {
        let body = r#"{
            "Status": 0,
            "TC": false,
            "RD": true,
            "RA": true,
            "AD": false,
            "CD": false,
            "Question": [{"name": "example.com.", "type": 1}],
            "Answer": [{"name": "example.com.", "type": 1, "TTL": 300, "data": "93.184.216.34"}],
            "edns_client_subnet": "192.0.2.0/24"
        }"#;

        let parsed: DnsJsonResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, Some(0));
        assert_eq!(parsed.rd, Some(true));
        assert_eq!(parsed.question.len(), 1);
        assert_eq!(parsed.question[0].name(), Some("example.com."));
        assert_eq!(parsed.answer[0].data(), Some("93.184.216.34"));
        assert_eq!(parsed.answer[0].rest["TTL"], 300);
        assert!(parsed.answer[0].is_type(RecordType::A));
        assert_eq!(
            parsed.extra.get("edns_client_subnet"),
            Some(&Value::String("192.0.2.0/24".to_string()))
        );
    }

    #[test]
    fn test_single_question_object_is_normalized() {
        let body = r#"{"Status": 3, "Question": {"name": "nope.invalid.", "type": 28}}"#;

        let parsed: DnsJsonResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.question.len(), 1);
        assert_eq!(parsed.question[0].rtype, 28);
        assert_eq!(parsed.question[0].name(), Some("nope.invalid."));
        assert!(parsed.answer.is_empty());
    }

    #[test]
    fn test_null_fields_are_falsy() {
        let body = r#"{"Status": null, "TC": null, "Question": null, "Answer": null}"#;

        let parsed: DnsJsonResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, None);
        assert_eq!(parsed.tc, None);
        assert!(parsed.question.is_empty());
        assert!(parsed.answer.is_empty());
    }

    #[test]
    fn test_unknown_fields_survive_serialization() {
        let body = r#"{"Status": 2, "Comment": "DNSSEC validation failure"}"#;

        let parsed: DnsJsonResponse = serde_json::from_str(body).unwrap();
        let out = serde_json::to_value(&parsed).unwrap();
        assert_eq!(out["Status"], 2);
        assert_eq!(out["Comment"], "DNSSEC validation failure");
        assert!(out.get("Answer").is_none());
    }

    #[test]
    fn test_record_fields_pass_through_unchanged() {
        // 缺少 TTL 与 name，data 不是字符串，另带一个未知字段
        let body = r#"{
            "Status": 0,
            "Answer": [{"type": 1, "data": "1.2.3.4", "flags": "x"}],
            "Authority": [{"name": "example.com.", "type": 6, "TTL": "3600", "data": {"mname": "ns.example.com."}}]
        }"#;

        let parsed: DnsJsonResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.answer[0].is_type(RecordType::A));
        assert_eq!(parsed.answer[0].name(), None);

        let out = serde_json::to_value(&parsed).unwrap();
        assert_eq!(
            out["Answer"][0],
            serde_json::json!({"type": 1, "data": "1.2.3.4", "flags": "x"})
        );
        assert_eq!(out["Authority"][0]["TTL"], "3600");
        assert_eq!(out["Authority"][0]["data"]["mname"], "ns.example.com.");
    }
}
