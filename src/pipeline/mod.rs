//! Transform core: category mapping, amount encoding and emission strategy.

pub mod amount;
pub mod category;
mod record;
mod state;
mod transform;

pub use amount::{AMOUNT_SCALE_FACTOR, encode_amount};
pub use category::{CategoryInfo, CategoryRegistry, CategoryRegistryBuilder, global_registry};
pub use record::{CostReading, NetmonConstants, NetmonRecord, OutboundRecord};
pub use state::{CacheKey, DifferentialStore};
pub use transform::{
    EmissionMode, RecordTransformer, SkipReason, SkippedReading, TransformFailure,
    TransformOutput,
};

pub(crate) use record::midnight_utc;
