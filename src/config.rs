//! Tunable data used by the insight functions.
//!
//! Fuel product codes and card reward rates change over time, so they live
//! here rather than in the aggregation code. A config is built once by the
//! caller and passed by reference to whatever needs it.

use serde::{Deserialize, Serialize};

use crate::Error;

/// A fuel product sold at the gas station, identified by its item number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelGrade {
    /// Display name for the grade, e.g. "Premium".
    pub name: String,
    /// The item number printed on fuel receipts for this grade.
    pub item_number: String,
}

impl FuelGrade {
    /// Create a fuel grade.
    pub fn new(name: &str, item_number: &str) -> Self {
        Self {
            name: name.to_owned(),
            item_number: item_number.to_owned(),
        }
    }
}

/// A credit card reward program with separate rates for gas and everything else.
///
/// A payment method belongs to the program when its description contains
/// `name_contains`, ignoring case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardProgram {
    /// Case-insensitive substring of the tender description.
    pub name_contains: String,
    /// Reward rate for gas purchases, e.g. 0.04 for 4%.
    pub gas_rate: f64,
    /// Reward rate for all other purchases.
    pub merchandise_rate: f64,
}

impl RewardProgram {
    /// Whether a tender description belongs to this program.
    pub fn matches(&self, tender_description: &str) -> bool {
        tender_description
            .to_uppercase()
            .contains(&self.name_contains.to_uppercase())
    }
}

/// The rate and annual cap of the membership rewards program.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardTerms {
    /// Fraction of the qualifying subtotal paid back.
    pub rate: f64,
    /// The most that can be earned.
    pub cap: f64,
}

impl Default for RewardTerms {
    fn default() -> Self {
        Self {
            rate: 0.02,
            cap: 1000.0,
        }
    }
}

/// Configuration shared by the normalizer, insights and store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsightsConfig {
    /// Fuel grades used to detect gas purchases and split prices by grade.
    pub fuel_grades: Vec<FuelGrade>,
    /// Card programs with their own reward rates.
    pub reward_programs: Vec<RewardProgram>,
    /// Reward rate for payment methods that match no program.
    pub default_reward_rate: f64,
    /// Membership reward rate and cap.
    pub reward_terms: RewardTerms,
    /// How many items the discount insights list.
    pub top_discount_limit: usize,
    /// Largest unit price difference for a return to match an earlier purchase.
    pub price_match_tolerance: f64,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            fuel_grades: vec![
                FuelGrade::new("Premium", "800877"),
                FuelGrade::new("Regular", "800599"),
            ],
            reward_programs: vec![RewardProgram {
                name_contains: "COSTCO VISA".to_owned(),
                gas_rate: 0.04,
                merchandise_rate: 0.02,
            }],
            default_reward_rate: 0.01,
            reward_terms: RewardTerms::default(),
            top_discount_limit: 10,
            price_match_tolerance: 0.02,
        }
    }
}

impl InsightsConfig {
    /// Parse a config from JSON. Missing fields take their default values.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if `text` is not valid JSON, has fields
    /// of the wrong type, or contains a negative rate.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let config: InsightsConfig =
            serde_json::from_str(text).map_err(|error| Error::InvalidConfig(error.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Check that every rate, cap and tolerance is a non-negative number.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] naming the first value that is negative
    /// or not finite.
    pub fn validate(&self) -> Result<(), Error> {
        let rates = self
            .reward_programs
            .iter()
            .flat_map(|program| [program.gas_rate, program.merchandise_rate])
            .chain([
                self.default_reward_rate,
                self.reward_terms.rate,
                self.reward_terms.cap,
                self.price_match_tolerance,
            ]);

        for rate in rates {
            if !rate.is_finite() || rate < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "rates, caps and tolerances must be non-negative, got {rate}"
                )));
            }
        }

        Ok(())
    }

    /// The fuel grade sold under `item_number`, if any.
    pub fn fuel_grade(&self, item_number: &str) -> Option<&FuelGrade> {
        self.fuel_grades
            .iter()
            .find(|grade| grade.item_number == item_number)
    }

    /// The reward program a tender description belongs to, if any.
    pub fn reward_program(&self, tender_description: &str) -> Option<&RewardProgram> {
        self.reward_programs
            .iter()
            .find(|program| program.matches(tender_description))
    }
}
