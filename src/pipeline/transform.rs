//! Readings → outbound records, under an absolute or differential strategy.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::amount::encode_amount;
use super::category::CategoryRegistry;
use super::record::{CostReading, NetmonConstants, NetmonRecord, OutboundRecord};
use super::state::{CacheKey, DifferentialStore};
use crate::Error;

/// How repeated readings of the same (service, period) are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmissionMode {
    /// Re-publish the full reported amount on every cycle.
    #[default]
    Absolute,
    /// Publish only the positive increase since the last observation.
    Differential,
}

impl EmissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absolute => "ABSOLUTE",
            Self::Differential => "DIFFERENTIAL",
        }
    }
}

impl fmt::Display for EmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ABSOLUTE" => Ok(Self::Absolute),
            "DIFFERENTIAL" => Ok(Self::Differential),
            other => Err(format!(
                "unknown emission mode '{}', expected ABSOLUTE or DIFFERENTIAL",
                other
            )),
        }
    }
}

/// Why a differential reading produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Same amount as the previous observation.
    Unchanged,
    /// Amount went down, typically a vendor credit.
    Credit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedReading {
    pub key: String,
    pub reason: SkipReason,
    pub delta: Decimal,
}

#[derive(Debug)]
pub struct TransformFailure {
    pub key: String,
    pub error: Error,
}

/// Result of transforming one batch. Failures are per reading and never
/// prevent the remaining readings from producing records.
///
/// In differential mode `baselines` holds the amounts observed in this batch.
/// They only reach the store through [`RecordTransformer::commit`], which
/// callers invoke once the records have been delivered.
#[derive(Debug, Default)]
pub struct TransformOutput {
    pub records: Vec<OutboundRecord>,
    pub skipped: Vec<SkippedReading>,
    pub failures: Vec<TransformFailure>,
    pub baselines: HashMap<CacheKey, Decimal>,
}

impl TransformOutput {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

enum Delta {
    Emit(Decimal),
    Skip(SkippedReading),
}

pub struct RecordTransformer {
    mode: EmissionMode,
    registry: Arc<CategoryRegistry>,
    constants: NetmonConstants,
    store: Arc<DifferentialStore>,
}

impl RecordTransformer {
    pub fn new(mode: EmissionMode, constants: NetmonConstants) -> Self {
        Self {
            mode,
            registry: Arc::new(CategoryRegistry::default()),
            constants,
            store: Arc::new(DifferentialStore::new()),
        }
    }

    pub fn with_registry(mut self, registry: Arc<CategoryRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_store(mut self, store: Arc<DifferentialStore>) -> Self {
        self.store = store;
        self
    }

    pub fn mode(&self) -> EmissionMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<DifferentialStore> {
        &self.store
    }

    /// Builds records for `readings` without touching the store.
    pub fn transform(&self, readings: &[CostReading]) -> TransformOutput {
        let mut output = TransformOutput::default();

        for reading in readings {
            let key = reading.record_key();
            let amount = match self.mode {
                EmissionMode::Absolute => reading.amount,
                EmissionMode::Differential => match self.observe(reading, &mut output.baselines) {
                    Ok(Delta::Emit(delta)) => delta,
                    Ok(Delta::Skip(skipped)) => {
                        debug!(key = %skipped.key, delta = %skipped.delta, reason = ?skipped.reason, "Skipped reading");
                        output.skipped.push(skipped);
                        continue;
                    }
                    Err(error) => {
                        warn!(key = %key, amount = %reading.amount, error = %error, "Failed to compute cost delta");
                        output.failures.push(TransformFailure { key, error });
                        continue;
                    }
                },
            };

            match self.build_record(reading, key.clone(), amount) {
                Ok(record) => output.records.push(record),
                Err(error) => {
                    warn!(key = %key, amount = %amount, error = %error, "Failed to transform reading");
                    output.failures.push(TransformFailure { key, error });
                }
            }
        }

        output
    }

    /// Writes the batch's observed amounts into the store. Returns how many
    /// baselines were updated.
    pub fn commit(&self, output: &TransformOutput) -> usize {
        for (key, amount) in &output.baselines {
            self.store.record(key.clone(), *amount);
        }
        output.baselines.len()
    }

    /// Stages the reading as the new baseline and returns the delta decision.
    ///
    /// Every observed amount is staged, including skipped ones, so a credit
    /// lowers the baseline once the batch is committed. Readings repeated
    /// within one batch compare against the staged amount.
    fn observe(
        &self,
        reading: &CostReading,
        baselines: &mut HashMap<CacheKey, Decimal>,
    ) -> crate::Result<Delta> {
        let cache_key = CacheKey::for_reading(reading);
        let previous = baselines
            .get(&cache_key)
            .copied()
            .unwrap_or_else(|| self.store.previous(&cache_key));
        baselines.insert(cache_key, reading.amount);

        let delta = reading
            .amount
            .checked_sub(previous)
            .ok_or(Error::Encode {
                amount: reading.amount,
                reason: "difference from previous amount overflows",
            })?;

        if delta > Decimal::ZERO {
            return Ok(Delta::Emit(delta));
        }

        Ok(Delta::Skip(SkippedReading {
            key: reading.record_key(),
            reason: if delta.is_zero() {
                SkipReason::Unchanged
            } else {
                SkipReason::Credit
            },
            delta,
        }))
    }

    fn build_record(
        &self,
        reading: &CostReading,
        key: String,
        amount: Decimal,
    ) -> crate::Result<OutboundRecord> {
        let bytes = encode_amount(amount)?;
        let category = self.registry.lookup(&reading.service);
        let record = NetmonRecord::new(category, &self.constants, &reading.period_start, bytes);

        debug!(
            service = %reading.service,
            cost = %reading.amount,
            bytes,
            proto = %category.code,
            proto_name = %category.name,
            "Transformed cost data"
        );

        Ok(OutboundRecord::encode(key, &record)?)
    }
}

impl fmt::Debug for RecordTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordTransformer")
            .field("mode", &self.mode)
            .field("constants", &self.constants)
            .field("tracked_keys", &self.store.len())
            .finish()
    }
}
