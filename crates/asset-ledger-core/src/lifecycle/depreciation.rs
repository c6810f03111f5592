use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::validate_purchase;
use crate::error::{Error, Result};
use crate::model::{CanonicalAsset, DepreciationMethod, PurchaseInfo};

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0;
const VALUE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepreciationSchedule {
    pub method: DepreciationMethod,
    pub purchase_price: f64,
    pub salvage_value: f64,
    pub useful_life_years: u32,
    /// Fractional years since purchase; zero for future purchase dates.
    pub age_in_years: f64,
    /// Straight-line: the fixed annual charge. Double-declining: the charge
    /// for the year currently in progress.
    pub depreciation_per_year: f64,
    pub accumulated_depreciation: f64,
    pub current_value: f64,
    pub is_fully_depreciated: bool,
}

pub fn age_in_years(purchase_date: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - purchase_date).num_seconds() as f64;
    (seconds / SECONDS_PER_YEAR).max(0.0)
}

/// Current book value of a purchase at `now`. Never below salvage value.
pub fn calculate_depreciation(purchase: &PurchaseInfo, now: DateTime<Utc>) -> Result<DepreciationSchedule> {
    validate_purchase(purchase)?;

    let price = purchase.purchase_price;
    let salvage = purchase.salvage_value;
    let life = purchase.useful_life_years as f64;
    let age = age_in_years(purchase.purchase_date, now);

    let (per_year, current_value) = match purchase.method {
        DepreciationMethod::StraightLine => {
            let annual = (price - salvage) / life;
            (annual, f64::max(salvage, price - annual * age))
        }
        DepreciationMethod::DoubleDeclining => {
            let rate = 2.0 / life;
            let mut value = price;
            for _ in 0..age.floor() as u64 {
                value *= 1.0 - rate;
                if value <= salvage {
                    value = salvage;
                    break;
                }
            }
            let charge = (value * rate).min(value - salvage).max(0.0);
            (charge, value)
        }
    };

    Ok(DepreciationSchedule {
        method: purchase.method,
        purchase_price: price,
        salvage_value: salvage,
        useful_life_years: purchase.useful_life_years,
        age_in_years: age,
        depreciation_per_year: per_year,
        accumulated_depreciation: price - current_value,
        current_value,
        is_fully_depreciated: current_value - salvage <= VALUE_EPSILON,
    })
}

impl CanonicalAsset {
    pub fn depreciation(&self, now: DateTime<Utc>) -> Result<DepreciationSchedule> {
        let purchase = self.purchase.as_ref().ok_or_else(|| {
            Error::Validation(format!("Asset {} has no purchase information", self.id))
        })?;
        calculate_depreciation(purchase, now)
    }
}
