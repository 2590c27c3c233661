//! Inbound readings and outbound NETMON records.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::category::CategoryInfo;

/// One (service, period, amount) observation from the billing source.
#[derive(Debug, Clone, PartialEq)]
pub struct CostReading {
    pub service: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub amount: Decimal,
    pub unit: Option<String>,
    pub usage_quantity: Option<Decimal>,
    pub estimated: bool,
}

impl CostReading {
    /// Daily reading covering `[day, day + 1)`.
    pub fn daily(service: impl Into<String>, day: NaiveDate, amount: Decimal) -> Self {
        let start = midnight_utc(day);
        Self {
            service: service.into(),
            period_start: start,
            period_end: start + chrono::Duration::days(1),
            amount,
            unit: Some("USD".into()),
            usage_quantity: None,
            estimated: false,
        }
    }

    /// Period start as it appears in record and cache keys.
    ///
    /// Midnight starts render as `YYYY-MM-DD`; hourly buckets keep the time.
    pub fn period_key(&self) -> String {
        format_period(&self.period_start)
    }

    /// Partition key for the message bus: `<service>-<period>`.
    pub fn record_key(&self) -> String {
        format!("{}-{}", self.service, self.period_key())
    }
}

pub(crate) fn midnight_utc(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub(crate) fn format_period(start: &DateTime<Utc>) -> String {
    if start.num_seconds_from_midnight() == 0 {
        start.format("%Y-%m-%d").to_string()
    } else {
        start.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

/// Process-wide fields stamped onto every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetmonConstants {
    pub ip: String,
    pub vlan: String,
    pub dir: i64,
    pub sim: String,
}

impl Default for NetmonConstants {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".into(),
            vlan: "AWS".into(),
            dir: 0,
            sim: "000000000000".into(),
        }
    }
}

/// Serialized value of an outbound record. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetmonRecord {
    #[serde(rename = "_L7_PROTO")]
    pub l7_proto: String,
    #[serde(rename = "_L7_PROTO_NAME")]
    pub l7_proto_name: String,
    #[serde(rename = "_L7_PROTO_CATEGORY")]
    pub l7_proto_category: String,
    #[serde(rename = "_IP")]
    pub ip: String,
    #[serde(rename = "_VLAN")]
    pub vlan: String,
    #[serde(rename = "_DIR")]
    pub dir: i64,
    #[serde(rename = "_SIM")]
    pub sim: String,
    #[serde(rename = "_DATE")]
    pub date: i64,
    #[serde(rename = "_BYTES")]
    pub bytes: i64,
}

impl NetmonRecord {
    pub fn new(
        category: &CategoryInfo,
        constants: &NetmonConstants,
        period_start: &DateTime<Utc>,
        bytes: i64,
    ) -> Self {
        Self {
            l7_proto: category.code.to_string(),
            l7_proto_name: category.name.to_string(),
            l7_proto_category: category.category.to_string(),
            ip: constants.ip.clone(),
            vlan: constants.vlan.clone(),
            dir: constants.dir,
            sim: constants.sim.clone(),
            date: period_start.timestamp(),
            bytes,
        }
    }
}

/// Keyed payload handed to the message bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub key: String,
    pub value: Bytes,
}

impl OutboundRecord {
    pub fn encode(key: impl Into<String>, record: &NetmonRecord) -> serde_json::Result<Self> {
        Ok(Self {
            key: key.into(),
            value: Bytes::from(serde_json::to_vec(record)?),
        })
    }

    pub fn decode(&self) -> serde_json::Result<NetmonRecord> {
        serde_json::from_slice(&self.value)
    }
}
