pub mod asset;
pub mod audit;
pub mod discovery;
pub mod license;

pub use asset::*;
pub use audit::*;
pub use discovery::*;
pub use license::*;

/// Case-insensitive comparison key for serial numbers and asset tags.
/// Blank values have no key.
pub fn identifier_key(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}
