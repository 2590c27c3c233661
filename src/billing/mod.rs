//! Billing data source: the query window and the fetch collaborator.

#[cfg(feature = "aws")]
mod cost_explorer;
pub mod response;

#[cfg(feature = "aws")]
pub use cost_explorer::{COST_EXPLORER_ENDPOINT, CostExplorerClient};
pub use response::GetCostAndUsageResponse;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};

use crate::Result;
use crate::pipeline::CostReading;

/// Metric the transform reads amounts from.
pub const COST_METRIC: &str = "UnblendedCost";
/// Fetched alongside cost for diagnostics only.
pub const USAGE_METRIC: &str = "UsageQuantity";

/// Size of the aggregation bucket requested from the billing API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Granularity {
    Hourly,
    #[default]
    Daily,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Monthly => "MONTHLY",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOURLY" => Ok(Self::Hourly),
            "DAILY" => Ok(Self::Daily),
            "MONTHLY" => Ok(Self::Monthly),
            other => Err(format!(
                "unknown granularity '{}', expected HOURLY, DAILY or MONTHLY",
                other
            )),
        }
    }
}

/// One billing request: `[start, end)` grouped by a single dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
    pub group_by: String,
    pub metrics: Vec<String>,
}

impl CostQuery {
    /// Window `[today - lookback_days, today)`.
    pub fn lookback(
        today: NaiveDate,
        lookback_days: u32,
        granularity: Granularity,
        group_by: impl Into<String>,
    ) -> Self {
        let start = today
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        Self {
            start,
            end: today,
            granularity,
            group_by: group_by.into(),
            metrics: vec![COST_METRIC.to_string(), USAGE_METRIC.to_string()],
        }
    }

    /// `(Start, End)` strings in the format the granularity requires.
    pub fn time_period(&self) -> (String, String) {
        match self.granularity {
            Granularity::Hourly => (
                format!("{}T00:00:00Z", self.start.format("%Y-%m-%d")),
                format!("{}T00:00:00Z", self.end.format("%Y-%m-%d")),
            ),
            Granularity::Daily | Granularity::Monthly => (
                self.start.format("%Y-%m-%d").to_string(),
                self.end.format("%Y-%m-%d").to_string(),
            ),
        }
    }

    pub fn to_request_body(&self, next_page_token: Option<&str>) -> serde_json::Value {
        let (start, end) = self.time_period();
        let mut body = serde_json::json!({
            "TimePeriod": { "Start": start, "End": end },
            "Granularity": self.granularity.as_str(),
            "Metrics": self.metrics,
            "GroupBy": [{ "Type": "DIMENSION", "Key": self.group_by }],
        });
        if let Some(token) = next_page_token
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert("NextPageToken".into(), token.into());
        }
        body
    }
}

/// Upstream cost data provider.
///
/// An empty `Vec` is a valid "nothing to report" result, not an error.
#[async_trait]
pub trait BillingSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, query: &CostQuery) -> Result<Vec<CostReading>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_lookback_window() {
        let query = CostQuery::lookback(date("2024-03-01"), 2, Granularity::Daily, "SERVICE");
        assert_eq!(
            query.time_period(),
            ("2024-02-28".to_string(), "2024-03-01".to_string())
        );
        assert_eq!(query.metrics, vec!["UnblendedCost", "UsageQuantity"]);
    }

    #[test]
    fn test_hourly_time_period() {
        let query = CostQuery::lookback(date("2024-03-01"), 1, Granularity::Hourly, "SERVICE");
        assert_eq!(
            query.time_period(),
            (
                "2024-02-29T00:00:00Z".to_string(),
                "2024-03-01T00:00:00Z".to_string()
            )
        );
    }

    #[test]
    fn test_request_body() {
        let query = CostQuery::lookback(date("2024-01-15"), 1, Granularity::Daily, "SERVICE");
        let body = query.to_request_body(None);
        assert_eq!(body["TimePeriod"]["Start"], "2024-01-14");
        assert_eq!(body["TimePeriod"]["End"], "2024-01-15");
        assert_eq!(body["Granularity"], "DAILY");
        assert_eq!(body["GroupBy"][0]["Type"], "DIMENSION");
        assert_eq!(body["GroupBy"][0]["Key"], "SERVICE");
        assert!(body.get("NextPageToken").is_none());

        let body = query.to_request_body(Some("page-2"));
        assert_eq!(body["NextPageToken"], "page-2");
    }

    #[test]
    fn test_granularity_parse() {
        assert_eq!("daily".parse::<Granularity>(), Ok(Granularity::Daily));
        assert_eq!("HOURLY".parse::<Granularity>(), Ok(Granularity::Hourly));
        assert!("WEEKLY".parse::<Granularity>().is_err());
    }
}
