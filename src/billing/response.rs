//! `GetCostAndUsage` response body and its conversion into readings.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use super::{COST_METRIC, USAGE_METRIC};
use crate::pipeline::{CostReading, midnight_utc};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetCostAndUsageResponse {
    #[serde(default)]
    pub results_by_time: Vec<ResultByTime>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultByTime {
    pub time_period: DateInterval,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub estimated: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DateInterval {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub metrics: HashMap<String, MetricValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricValue {
    pub amount: Option<String>,
    pub unit: Option<String>,
}

impl GetCostAndUsageResponse {
    pub fn group_count(&self) -> usize {
        self.results_by_time.iter().map(|r| r.groups.len()).sum()
    }

    /// Flattens every (period, group) pair into a reading.
    ///
    /// Groups without a key or a cost metric are skipped; an unparsable date or
    /// amount fails the whole response.
    pub fn into_readings(self) -> Result<Vec<CostReading>> {
        let mut readings = Vec::with_capacity(self.group_count());

        for result in self.results_by_time {
            let period_start = parse_period(&result.time_period.start)?;
            let period_end = parse_period(&result.time_period.end)?;

            for group in result.groups {
                let Some(service) = group.keys.into_iter().next() else {
                    warn!(period = %result.time_period.start, "Skipping group without keys");
                    continue;
                };
                let Some(cost) = group.metrics.get(COST_METRIC) else {
                    warn!(service = %service, "Skipping group without {} metric", COST_METRIC);
                    continue;
                };
                let Some(raw_amount) = cost.amount.as_deref() else {
                    warn!(service = %service, "Skipping group without cost amount");
                    continue;
                };

                let usage_quantity = group
                    .metrics
                    .get(USAGE_METRIC)
                    .and_then(|m| m.amount.as_deref())
                    .and_then(|a| parse_amount(a).ok());

                readings.push(CostReading {
                    amount: parse_amount(raw_amount)?,
                    unit: cost.unit.clone(),
                    service,
                    period_start,
                    period_end,
                    usage_quantity,
                    estimated: result.estimated,
                });
            }
        }

        Ok(readings)
    }
}

/// Parses plain (`"12.34"`) and scientific (`"1.2E-7"`) notation.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| Error::Parse(format!("invalid amount '{}': {}", raw, e)))
}

/// Accepts `YYYY-MM-DD` (midnight UTC) and RFC 3339 timestamps.
pub fn parse_period(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(midnight_utc(day));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("invalid period '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"{
        "GroupDefinitions": [{"Type": "DIMENSION", "Key": "SERVICE"}],
        "ResultsByTime": [{
            "TimePeriod": {"Start": "2024-01-14", "End": "2024-01-15"},
            "Total": {},
            "Groups": [
                {"Keys": ["Amazon EC2"], "Metrics": {
                    "UnblendedCost": {"Amount": "123.45", "Unit": "USD"},
                    "UsageQuantity": {"Amount": "720.0", "Unit": "Hrs"}}},
                {"Keys": ["Amazon S3"], "Metrics": {
                    "UnblendedCost": {"Amount": "45.67", "Unit": "USD"},
                    "UsageQuantity": {"Amount": "1000.0", "Unit": "GB-Mo"}}},
                {"Keys": ["Amazon RDS"], "Metrics": {
                    "UnblendedCost": {"Amount": "234.56", "Unit": "USD"}}}
            ],
            "Estimated": true
        }],
        "DimensionValueAttributes": []
    }"#;

    #[test]
    fn test_parse_sample_response() {
        let response: GetCostAndUsageResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(response.group_count(), 3);
        assert!(response.next_page_token.is_none());

        let readings = response.into_readings().unwrap();
        assert_eq!(readings.len(), 3);

        let ec2 = &readings[0];
        assert_eq!(ec2.service, "Amazon EC2");
        assert_eq!(ec2.amount, dec!(123.45));
        assert_eq!(ec2.unit.as_deref(), Some("USD"));
        assert_eq!(ec2.usage_quantity, Some(dec!(720.0)));
        assert!(ec2.estimated);
        assert_eq!(ec2.period_key(), "2024-01-14");
        assert_eq!(ec2.period_start.timestamp(), 1705190400);
        assert_eq!(ec2.period_end.timestamp(), 1705276800);

        assert_eq!(readings[2].usage_quantity, None);
    }

    #[test]
    fn test_missing_results_is_empty() {
        let response: GetCostAndUsageResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_readings().unwrap().is_empty());

        let response: GetCostAndUsageResponse = serde_json::from_str(
            r#"{"ResultsByTime": [{"TimePeriod": {"Start": "2024-01-14", "End": "2024-01-15"}, "Groups": []}]}"#,
        )
        .unwrap();
        assert_eq!(response.group_count(), 0);
        assert!(response.into_readings().unwrap().is_empty());
    }

    #[test]
    fn test_incomplete_groups_are_skipped() {
        let response: GetCostAndUsageResponse = serde_json::from_str(
            r#"{"ResultsByTime": [{
                "TimePeriod": {"Start": "2024-01-14", "End": "2024-01-15"},
                "Groups": [
                    {"Keys": [], "Metrics": {"UnblendedCost": {"Amount": "1", "Unit": "USD"}}},
                    {"Keys": ["Amazon SQS"], "Metrics": {}},
                    {"Keys": ["Amazon SNS"], "Metrics": {"UnblendedCost": {"Amount": "0.5", "Unit": "USD"}}}
                ]}]}"#,
        )
        .unwrap();

        let readings = response.into_readings().unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].service, "Amazon SNS");
    }

    #[test]
    fn test_bad_amount_fails_response() {
        let response: GetCostAndUsageResponse = serde_json::from_str(
            r#"{"ResultsByTime": [{
                "TimePeriod": {"Start": "2024-01-14", "End": "2024-01-15"},
                "Groups": [{"Keys": ["Amazon EC2"], "Metrics": {"UnblendedCost": {"Amount": "n/a"}}}]}]}"#,
        )
        .unwrap();
        assert!(matches!(response.into_readings(), Err(Error::Parse(_))));
    }

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("0.0000001").unwrap(), dec!(0.0000001));
        assert_eq!(parse_amount("1.2E-7").unwrap(), dec!(0.00000012));
        assert_eq!(parse_amount(" -3.5 ").unwrap(), dec!(-3.5));
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn test_parse_hourly_period() {
        let start = parse_period("2024-01-14T13:00:00Z").unwrap();
        assert_eq!(start.timestamp(), 1705190400 + 13 * 3600);
        assert!(parse_period("14/01/2024").is_err());
    }
}
