//! Raw vehicle records and their conversion into pipeline frames.
//!
//! The record boundary is where human-entered values are checked and where
//! the door count is remapped to the tokens the encoder was fitted on.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::ValidationConfig;
use crate::error::{PipelineError, Stage};
use crate::frame::{Column, Frame};
use crate::schema::{self, RECORD_COLUMNS};
use crate::Result;

/// Door count as offered to users.
///
/// The training data stored the door ranges as spreadsheet-mangled dates
/// ("02-Mar", "04-May"); the encoder only knows those tokens, so the remap in
/// [`Doors::encoded_token`] must stay byte-for-byte identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Doors {
    #[serde(rename = "2", alias = "02-Mar")]
    Two,
    #[serde(rename = "4", alias = "04-May")]
    Four,
    #[serde(rename = ">5")]
    MoreThanFive,
}

impl Doors {
    pub fn all() -> [Doors; 3] {
        [Doors::Two, Doors::Four, Doors::MoreThanFive]
    }

    /// Value shown to and accepted from users.
    pub fn display_value(&self) -> &'static str {
        match self {
            Doors::Two => "2",
            Doors::Four => "4",
            Doors::MoreThanFive => ">5",
        }
    }

    /// Category token fed to the encoder.
    pub fn encoded_token(&self) -> &'static str {
        match self {
            Doors::Two => "02-Mar",
            Doors::Four => "04-May",
            Doors::MoreThanFive => ">5",
        }
    }
}

impl fmt::Display for Doors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_value())
    }
}

impl FromStr for Doors {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Doors::all()
            .into_iter()
            .find(|d| d.display_value() == s || d.encoded_token() == s)
            .ok_or_else(|| PipelineError::InvalidValue {
                field: schema::DOORS.to_string(),
                reason: format!("expected one of 2, 4, >5, got '{s}'"),
            })
    }
}

/// One used vehicle, as entered by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Record {
    #[serde(rename = "Levy")]
    pub levy: f64,
    #[serde(rename = "Manufacturer")]
    pub manufacturer: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Prod. year", deserialize_with = "whole_number")]
    pub prod_year: i32,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Leather interior")]
    pub leather_interior: String,
    #[serde(rename = "Fuel type")]
    pub fuel_type: String,
    #[serde(rename = "Engine volume")]
    pub engine_volume: f64,
    #[serde(rename = "Mileage")]
    pub mileage: f64,
    #[serde(rename = "Cylinders")]
    pub cylinders: f64,
    #[serde(rename = "Gear box type")]
    pub gear_box_type: String,
    #[serde(rename = "Drive wheels")]
    pub drive_wheels: String,
    #[serde(rename = "Doors")]
    pub doors: Doors,
    #[serde(rename = "Wheel")]
    pub wheel: String,
    #[serde(rename = "Color")]
    pub color: String,
    #[serde(rename = "Airbags", deserialize_with = "whole_number")]
    pub airbags: u32,
}

/// Integer field that also accepts whole-valued floats such as `2015.0`.
fn whole_number<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(de::Error::custom(format!("expected a whole number, got {value}")));
    }
    T::try_from(value as i64).map_err(|_| de::Error::custom(format!("{value} is out of range")))
}

/// A single record value, borrowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl Record {
    /// Parse a record from a JSON object, checking field completeness first.
    ///
    /// Missing or unexpected field names fail with `SchemaMismatch` so the
    /// caller learns exactly which names are off instead of a generic decode
    /// error.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            PipelineError::schema(Stage::Validation, "record must be a JSON object")
        })?;

        let missing: Vec<&str> = RECORD_COLUMNS
            .iter()
            .copied()
            .filter(|name| !object.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::schema(
                Stage::Validation,
                format!("missing fields: {}", missing.join(", ")),
            ));
        }

        let unexpected: Vec<&str> = object
            .keys()
            .map(String::as_str)
            .filter(|key| !RECORD_COLUMNS.contains(key))
            .collect();
        if !unexpected.is_empty() {
            return Err(PipelineError::schema(
                Stage::Validation,
                format!("unexpected fields: {}", unexpected.join(", ")),
            ));
        }

        serde_json::from_value(value.clone()).map_err(|e| PipelineError::InvalidValue {
            field: "record".to_string(),
            reason: e.to_string(),
        })
    }

    /// All sixteen values in declared column order.
    ///
    /// Doors is emitted as its encoder token, not its display value.
    pub fn fields(&self) -> [(&'static str, FieldValue<'_>); 16] {
        use FieldValue::{Number, Text};
        [
            (schema::LEVY, Number(self.levy)),
            (schema::MANUFACTURER, Text(&self.manufacturer)),
            (schema::MODEL, Text(&self.model)),
            (schema::PROD_YEAR, Number(f64::from(self.prod_year))),
            (schema::CATEGORY, Text(&self.category)),
            (schema::LEATHER_INTERIOR, Text(&self.leather_interior)),
            (schema::FUEL_TYPE, Text(&self.fuel_type)),
            (schema::ENGINE_VOLUME, Number(self.engine_volume)),
            (schema::MILEAGE, Number(self.mileage)),
            (schema::CYLINDERS, Number(self.cylinders)),
            (schema::GEAR_BOX_TYPE, Text(&self.gear_box_type)),
            (schema::DRIVE_WHEELS, Text(&self.drive_wheels)),
            (schema::DOORS, Text(self.doors.encoded_token())),
            (schema::WHEEL, Text(&self.wheel)),
            (schema::COLOR, Text(&self.color)),
            (schema::AIRBAGS, Number(f64::from(self.airbags))),
        ]
    }

    /// Check numeric fields against the configured input domain.
    pub fn validate(&self, limits: &ValidationConfig) -> Result<()> {
        for (name, value) in self.fields() {
            if let FieldValue::Number(v) = value {
                if !v.is_finite() {
                    return Err(invalid(name, format!("must be finite, got {v}")));
                }
                if v < 0.0 {
                    return Err(invalid(name, format!("must be non-negative, got {v}")));
                }
            }
        }

        if self.prod_year < limits.min_prod_year || self.prod_year > limits.max_prod_year {
            return Err(invalid(
                schema::PROD_YEAR,
                format!(
                    "must be within {}..={}, got {}",
                    limits.min_prod_year, limits.max_prod_year, self.prod_year
                ),
            ));
        }

        if self.airbags > limits.max_airbags {
            return Err(invalid(
                schema::AIRBAGS,
                format!("must be at most {}, got {}", limits.max_airbags, self.airbags),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> PipelineError {
    PipelineError::InvalidValue {
        field: field.to_string(),
        reason,
    }
}

/// Lay records out as a frame with one column per field, in record order.
pub fn records_to_frame(records: &[Record]) -> Result<Frame> {
    let rows: Vec<_> = records.iter().map(Record::fields).collect();

    let columns = RECORD_COLUMNS
        .iter()
        .enumerate()
        .map(|(idx, &name)| {
            if schema::is_categorical(name) {
                let values = rows
                    .iter()
                    .map(|row| match row[idx].1 {
                        FieldValue::Text(s) => s.to_string(),
                        FieldValue::Number(n) => n.to_string(),
                    })
                    .collect();
                Column::text(name, values)
            } else {
                let values = rows
                    .iter()
                    .map(|row| match row[idx].1 {
                        FieldValue::Number(n) => n,
                        FieldValue::Text(_) => f64::NAN,
                    })
                    .collect();
                Column::numeric(name, values)
            }
        })
        .collect();

    Frame::new(columns)
}
