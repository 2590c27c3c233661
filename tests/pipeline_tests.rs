//! Transform pipeline behaviour through the public API.
//!
//! ## Test Scenarios
//!
//! ### 1. Category mapping
//! - Known services, short labels, unknown and empty labels
//!
//! ### 2. Amount encoding
//! - Scale factor and rounding
//!
//! ### 3. Emission modes
//! - Absolute re-emission
//! - Differential deltas, credits and cold start
//! - Baselines only move when a batch is committed
//!
//! ### 4. Partial success
//! - One bad reading does not block the batch

use chrono::NaiveDate;
use cost_netmon::{
    CacheKey, CostReading, EmissionMode, NetmonConstants, NetmonRecord, RecordTransformer,
    SkipReason, TransformOutput, encode_amount,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 11, d).unwrap()
}

fn reading(service: &str, amount: Decimal) -> CostReading {
    CostReading::daily(service, day(27), amount)
}

/// Transforms and commits the batch's baselines, as a delivered cycle does.
fn delivered(transformer: &RecordTransformer, readings: &[CostReading]) -> TransformOutput {
    let output = transformer.transform(readings);
    transformer.commit(&output);
    output
}

fn bytes(records: &[cost_netmon::OutboundRecord]) -> Vec<i64> {
    records.iter().map(|r| r.decode().unwrap().bytes).collect()
}

// ============================================================================
// 1. Category mapping
// ============================================================================

mod category_tests {
    use cost_netmon::pipeline::category::lookup;

    #[test]
    fn test_known_services() {
        let ec2 = lookup("Amazon Elastic Compute Cloud - Compute");
        assert_eq!(ec2.code, "100");
        assert_eq!(ec2.name, "AWS_EC2");
        assert!(!ec2.is_fallback);

        assert_eq!(lookup("Amazon EC2").code, "100");
    }

    #[test]
    fn test_unknown_and_empty_labels_share_fallback() {
        let unknown = lookup("Some Brand New Service");
        let empty = lookup("");
        assert!(unknown.is_fallback);
        assert_eq!(unknown, empty);
        assert_eq!(unknown.code, "199");
        assert_eq!(unknown.name, "OTHER");
    }
}

// ============================================================================
// 2. Amount encoding
// ============================================================================

mod amount_tests {
    use super::*;

    #[test]
    fn test_encode_examples() {
        assert_eq!(encode_amount(dec!(123.45)).unwrap(), 12345);
        assert_eq!(encode_amount(dec!(45.67)).unwrap(), 4567);
        assert_eq!(encode_amount(Decimal::ZERO).unwrap(), 0);
        assert_eq!(encode_amount(dec!(0.005)).unwrap(), 1);
    }
}

// ============================================================================
// 3. Emission modes
// ============================================================================

mod emission_tests {
    use super::*;

    #[test]
    fn test_absolute_reemits_full_amount() {
        let transformer = RecordTransformer::new(EmissionMode::Absolute, NetmonConstants::default());

        let first = transformer.transform(&[reading("Amazon EC2", dec!(10.00))]);
        let second = transformer.transform(&[reading("Amazon EC2", dec!(10.00))]);

        assert_eq!(bytes(&first.records), vec![1000]);
        assert_eq!(bytes(&second.records), vec![1000]);
        assert!(transformer.store().is_empty());
    }

    #[test]
    fn test_differential_sequence() {
        let transformer =
            RecordTransformer::new(EmissionMode::Differential, NetmonConstants::default());

        let mut emitted = Vec::new();
        let mut skipped = 0;
        for amount in [dec!(10.50), dec!(10.75), dec!(11.00), dec!(11.00), dec!(11.50)] {
            let output = delivered(&transformer, &[reading("Amazon EC2", amount)]);
            emitted.extend(bytes(&output.records));
            skipped += output.skipped.len();
        }

        assert_eq!(emitted, vec![1050, 25, 25, 50]);
        assert_eq!(skipped, 1);

        let key = CacheKey::new("Amazon EC2", reading("Amazon EC2", dec!(0)).period_start);
        assert_eq!(transformer.store().previous(&key), dec!(11.50));
    }

    #[test]
    fn test_credit_moves_baseline_down() {
        let transformer =
            RecordTransformer::new(EmissionMode::Differential, NetmonConstants::default());

        delivered(&transformer, &[reading("Amazon EC2", dec!(11.00))]);
        let output = delivered(&transformer, &[reading("Amazon EC2", dec!(9.00))]);
        assert!(output.records.is_empty());
        assert_eq!(output.skipped[0].reason, SkipReason::Credit);

        let output = delivered(&transformer, &[reading("Amazon EC2", dec!(9.50))]);
        assert_eq!(bytes(&output.records), vec![50]);
    }

    #[test]
    fn test_cold_start_emits_full_amount() {
        let transformer =
            RecordTransformer::new(EmissionMode::Differential, NetmonConstants::default());

        delivered(&transformer, &[reading("Amazon EC2", dec!(3.00))]);
        transformer.store().clear();

        let output = delivered(&transformer, &[reading("Amazon EC2", dec!(5.00))]);
        assert_eq!(bytes(&output.records), vec![500]);
    }

    #[test]
    fn test_periods_are_tracked_separately() {
        let transformer =
            RecordTransformer::new(EmissionMode::Differential, NetmonConstants::default());

        let output = delivered(&transformer, &[
            CostReading::daily("Amazon EC2", day(26), dec!(2.00)),
            CostReading::daily("Amazon EC2", day(27), dec!(3.00)),
            CostReading::daily("Amazon S3", day(27), dec!(1.00)),
        ]);

        assert_eq!(bytes(&output.records), vec![200, 300, 100]);
        assert_eq!(transformer.store().len(), 3);
    }

    #[test]
    fn test_undelivered_batch_is_reemitted() {
        let transformer =
            RecordTransformer::new(EmissionMode::Differential, NetmonConstants::default());

        let lost = transformer.transform(&[reading("Amazon EC2", dec!(10.00))]);
        assert_eq!(bytes(&lost.records), vec![1000]);

        let retried = delivered(&transformer, &[reading("Amazon EC2", dec!(10.00))]);
        assert_eq!(bytes(&retried.records), vec![1000]);

        let settled = delivered(&transformer, &[reading("Amazon EC2", dec!(10.00))]);
        assert!(settled.records.is_empty());
    }
}

// ============================================================================
// 4. Partial success
// ============================================================================

mod partial_success_tests {
    use super::*;

    #[test]
    fn test_unencodable_reading_does_not_block_batch() {
        let transformer = RecordTransformer::new(EmissionMode::Absolute, NetmonConstants::default());

        let output = transformer.transform(&[
            reading("Amazon EC2", dec!(1.00)),
            reading("Amazon S3", Decimal::MAX),
            reading("Amazon RDS", dec!(2.00)),
        ]);

        assert_eq!(output.records.len(), 2);
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].key, "Amazon S3-2024-11-27");

        let keys: Vec<_> = output.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Amazon EC2-2024-11-27", "Amazon RDS-2024-11-27"]);
    }

    #[test]
    fn test_record_carries_constants() {
        let constants = NetmonConstants {
            ip: "10.8.193.94".into(),
            vlan: "TEAMSYSTEM".into(),
            dir: 1,
            sim: "393488628060".into(),
        };
        let transformer = RecordTransformer::new(EmissionMode::Absolute, constants);

        let output = transformer.transform(&[reading("Amazon RDS", dec!(234.56))]);
        let record: NetmonRecord = output.records[0].decode().unwrap();

        assert_eq!(record.ip, "10.8.193.94");
        assert_eq!(record.vlan, "TEAMSYSTEM");
        assert_eq!(record.dir, 1);
        assert_eq!(record.sim, "393488628060");
        assert_eq!(record.date, 1732665600);
        assert_eq!(record.bytes, 23456);
    }
}
