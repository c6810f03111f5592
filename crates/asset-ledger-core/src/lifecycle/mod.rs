pub mod asset;
pub mod depreciation;

pub use depreciation::{calculate_depreciation, DepreciationSchedule};
