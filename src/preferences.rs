use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The preferences form exactly as the browser submits it.
///
/// Every field is a raw string so a half-filled form can be echoed back to
/// the user alongside the warning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelForm {
    pub destination: String,
    pub departure_date: String,
    pub return_date: String,
    pub num_adults: String,
    pub num_children: String,
    pub budget: String,
    pub preferences: String,
}

/// Validated preferences for one search cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TravelPreferences {
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: NaiveDate,
    pub num_adults: u32,
    pub num_children: u32,
    pub budget: String,
    pub preferences: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill in all the required travel details.")]
    MissingFields(Vec<&'static str>),
    #[error("{field} must be a date like 2024-06-01, got {value:?}")]
    InvalidDate { field: &'static str, value: String },
    #[error("{field} must be a whole number of at least {min}, got {value:?}")]
    InvalidCount {
        field: &'static str,
        min: u32,
        value: String,
    },
}

impl TravelForm {
    /// Check required fields and parse the typed ones.
    pub fn validate(&self) -> Result<TravelPreferences, ValidationError> {
        let missing: Vec<&'static str> = [
            ("destination", &self.destination),
            ("departure_date", &self.departure_date),
            ("return_date", &self.return_date),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        Ok(TravelPreferences {
            destination: self.destination.clone(),
            departure_date: parse_date("departure_date", &self.departure_date)?,
            return_date: parse_date("return_date", &self.return_date)?,
            num_adults: parse_count("num_adults", &self.num_adults, 1)?,
            num_children: parse_count("num_children", &self.num_children, 0)?,
            budget: self.budget.clone(),
            preferences: self.preferences.clone(),
        })
    }
}

impl From<&TravelPreferences> for TravelForm {
    fn from(prefs: &TravelPreferences) -> Self {
        Self {
            destination: prefs.destination.clone(),
            departure_date: prefs.departure_date.format(DATE_FORMAT).to_string(),
            return_date: prefs.return_date.format(DATE_FORMAT).to_string(),
            num_adults: prefs.num_adults.to_string(),
            num_children: prefs.num_children.to_string(),
            budget: prefs.budget.clone(),
            preferences: prefs.preferences.clone(),
        }
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

// A blank count falls back to the field's minimum, like the form's default value.
fn parse_count(field: &'static str, value: &str, min: u32) -> Result<u32, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(min);
    }
    match value.parse::<u32>() {
        Ok(n) if n >= min => Ok(n),
        _ => Err(ValidationError::InvalidCount {
            field,
            min,
            value: value.to_string(),
        }),
    }
}
