// src/upstream/aggregator.rs
//
// "all" 查询：并发发出 A、AAAA、NS 三路协商查询，全部成功后合并为一个应答。

use crate::error::UpstreamError;
use crate::upstream::json::{AggregatedResult, DnsAnswerRecord, DnsJsonResponse, RecordSection};
use crate::upstream::negotiator::{FormatNegotiator, ResolveRequest};
use hickory_proto::rr::RecordType;
use tracing::debug;
use url::Url;

/// 可按 JavaScript 真值语义判断的标量
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for Option<bool> {
    fn is_truthy(&self) -> bool {
        matches!(self, Some(true))
    }
}

impl Truthy for Option<u32> {
    fn is_truthy(&self) -> bool {
        matches!(self, Some(n) if *n != 0)
    }
}

/// 按 ipv4、ipv6、ns 的顺序取第一个真值，都不是真值时取最后一个
///
/// 对布尔值等价于逻辑或。
pub fn first_truthy<T: Truthy + Copy>(values: [T; 3]) -> T {
    values
        .iter()
        .copied()
        .find(|v| v.is_truthy())
        .unwrap_or(values[2])
}

/// 合并后的状态与标志位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergedHeader {
    pub status: u32,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub ad: bool,
    pub cd: bool,
}

// 对三路结果的标量字段统一应用 first_truthy
pub fn reduce_header(parts: [&DnsJsonResponse; 3]) -> MergedHeader {
    let flag = |pick: fn(&DnsJsonResponse) -> Option<bool>| {
        first_truthy(parts.map(pick)).unwrap_or(false)
    };

    MergedHeader {
        status: first_truthy(parts.map(|p| p.status)).unwrap_or(0),
        tc: flag(|p| p.tc),
        rd: flag(|p| p.rd),
        ra: flag(|p| p.ra),
        ad: flag(|p| p.ad),
        cd: flag(|p| p.cd),
    }
}

fn records_of(records: &[DnsAnswerRecord], types: &[RecordType]) -> Vec<DnsAnswerRecord> {
    records
        .iter()
        .filter(|r| types.iter().any(|t| r.is_type(*t)))
        .cloned()
        .collect()
}

/// 合并三路应答
///
/// NS 子查询 Authority 段中的 NS/SOA 记录会同时出现在 `Answer` 和 `ns.records` 中。
pub fn merge(ipv4: DnsJsonResponse, ipv6: DnsJsonResponse, ns: DnsJsonResponse) -> AggregatedResult {
    let header = reduce_header([&ipv4, &ipv6, &ns]);

    let authority = records_of(&ns.authority, &[RecordType::NS, RecordType::SOA]);

    let mut ns_records = records_of(&ns.answer, &[RecordType::NS]);
    ns_records.extend(authority.iter().cloned());

    let ipv4_records = records_of(&ipv4.answer, &[RecordType::A]);
    let ipv6_records = records_of(&ipv6.answer, &[RecordType::AAAA]);

    let mut question = ipv4.question;
    question.extend(ipv6.question);
    question.extend(ns.question);

    let mut answer = ipv4.answer;
    answer.extend(ipv6.answer);
    answer.extend(ns.answer);
    answer.extend(authority);

    AggregatedResult {
        status: header.status,
        tc: header.tc,
        rd: header.rd,
        ra: header.ra,
        ad: header.ad,
        cd: header.cd,
        question,
        answer,
        ipv4: RecordSection {
            records: ipv4_records,
        },
        ipv6: RecordSection {
            records: ipv6_records,
        },
        ns: RecordSection { records: ns_records },
    }
}

/// 多记录聚合器
#[derive(Clone)]
pub struct MultiRecordAggregator {
    negotiator: FormatNegotiator,
}

impl MultiRecordAggregator {
    pub fn new(negotiator: FormatNegotiator) -> Self {
        Self { negotiator }
    }

    /// 并发查询 A、AAAA、NS 并合并
    ///
    /// 任一子查询失败即整体失败，其余仍在进行的子查询随之取消。
    pub async fn resolve_all(
        &self,
        domain: &str,
        upstream_base: &Url,
    ) -> Result<AggregatedResult, UpstreamError> {
        let ipv4_request = ResolveRequest::new(domain, RecordType::A, upstream_base.clone());
        let ipv6_request = ResolveRequest::new(domain, RecordType::AAAA, upstream_base.clone());
        let ns_request = ResolveRequest::new(domain, RecordType::NS, upstream_base.clone());

        let (ipv4, ipv6, ns) = tokio::try_join!(
            self.negotiator.resolve(&ipv4_request),
            self.negotiator.resolve(&ipv6_request),
            self.negotiator.resolve(&ns_request),
        )?;

        debug!(
            "Aggregated {}: {} A, {} AAAA, {} NS answers",
            domain,
            ipv4.answer.len(),
            ipv6.answer.len(),
            ns.answer.len()
        );

        Ok(merge(ipv4, ipv6, ns))
    }
}
