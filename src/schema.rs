//! Declared column contracts shared by every pipeline stage.
//!
//! **Critical for correctness**: these lists must match the column layout the
//! encoder and model were fitted on. Reordering, renaming or adding a column
//! does not raise anywhere downstream; it silently degrades predictions.
//! Artifacts are checked against these constants when they are loaded.

pub const LEVY: &str = "Levy";
pub const MANUFACTURER: &str = "Manufacturer";
pub const MODEL: &str = "Model";
pub const PROD_YEAR: &str = "Prod. year";
pub const CATEGORY: &str = "Category";
pub const LEATHER_INTERIOR: &str = "Leather interior";
pub const FUEL_TYPE: &str = "Fuel type";
pub const ENGINE_VOLUME: &str = "Engine volume";
pub const MILEAGE: &str = "Mileage";
pub const CYLINDERS: &str = "Cylinders";
pub const GEAR_BOX_TYPE: &str = "Gear box type";
pub const DRIVE_WHEELS: &str = "Drive wheels";
pub const DOORS: &str = "Doors";
pub const WHEEL: &str = "Wheel";
pub const COLOR: &str = "Color";
pub const AIRBAGS: &str = "Airbags";

/// All sixteen record fields, in training order.
pub const RECORD_COLUMNS: [&str; 16] = [
    LEVY,
    MANUFACTURER,
    MODEL,
    PROD_YEAR,
    CATEGORY,
    LEATHER_INTERIOR,
    FUEL_TYPE,
    ENGINE_VOLUME,
    MILEAGE,
    CYLINDERS,
    GEAR_BOX_TYPE,
    DRIVE_WHEELS,
    DOORS,
    WHEEL,
    COLOR,
    AIRBAGS,
];

/// Columns transformed by the encoder artifact.
pub const CATEGORICAL_COLUMNS: [&str; 10] = [
    MANUFACTURER,
    MODEL,
    CATEGORY,
    LEATHER_INTERIOR,
    FUEL_TYPE,
    GEAR_BOX_TYPE,
    DRIVE_WHEELS,
    DOORS,
    WHEEL,
    COLOR,
];

/// Collected and encoded, but not consumed by the model.
pub const DROPPED_COLUMNS: [&str; 3] = [DOORS, CYLINDERS, DRIVE_WHEELS];

/// Model input order.
pub const FEATURE_COLUMNS: [&str; 13] = [
    LEVY,
    MANUFACTURER,
    MODEL,
    PROD_YEAR,
    CATEGORY,
    LEATHER_INTERIOR,
    FUEL_TYPE,
    ENGINE_VOLUME,
    MILEAGE,
    GEAR_BOX_TYPE,
    WHEEL,
    COLOR,
    AIRBAGS,
];

/// Number of columns the model consumes.
pub const NUM_FEATURES: usize = FEATURE_COLUMNS.len();

/// Whether a record field is numeric or goes through the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

pub fn column_kind(name: &str) -> Option<ColumnKind> {
    if CATEGORICAL_COLUMNS.contains(&name) {
        Some(ColumnKind::Categorical)
    } else if RECORD_COLUMNS.contains(&name) {
        Some(ColumnKind::Numeric)
    } else {
        None
    }
}

pub fn is_categorical(name: &str) -> bool {
    CATEGORICAL_COLUMNS.contains(&name)
}

/// Human-readable description of a record field.
pub fn describe(name: &str) -> Option<&'static str> {
    let text = match name {
        LEVY => "Additional fee or tax for the vehicle in USD",
        MANUFACTURER => "The manufacturer or brand of the car (e.g., Toyota, Mazda)",
        MODEL => "The specific model of the car (e.g., Elantra, RX 450)",
        PROD_YEAR => "The year the vehicle was manufactured",
        CATEGORY => "The type or category of the car (e.g., sedan, jeep, minibus)",
        LEATHER_INTERIOR => "Whether the car has a leather interior (Yes/No)",
        FUEL_TYPE => "The type of fuel the car uses (e.g., petrol, diesel, hybrid)",
        ENGINE_VOLUME => "The engine capacity in liters",
        MILEAGE => "The distance the vehicle has traveled, in kilometers",
        CYLINDERS => "The number of cylinders in the engine",
        GEAR_BOX_TYPE => "The type of transmission (e.g., manual, automatic)",
        DRIVE_WHEELS => "The drivetrain (front, rear or 4x4)",
        DOORS => "The number of doors on the vehicle",
        WHEEL => "The steering side (left wheel or right-hand drive)",
        COLOR => "The color of the car (e.g., black, white, red)",
        AIRBAGS => "The number of airbags in the car",
        _ => return None,
    };
    Some(text)
}

pub const MANUFACTURERS: &[&str] = &[
    "LEXUS", "CHEVROLET", "HONDA", "FORD", "HYUNDAI", "TOYOTA", "MERCEDES-BENZ", "OPEL",
    "PORSCHE", "BMW", "JEEP", "VOLKSWAGEN", "AUDI", "RENAULT", "NISSAN", "SUBARU", "DAEWOO",
    "KIA", "MITSUBISHI", "SSANGYONG", "MAZDA", "GMC", "FIAT", "INFINITI", "ALFA ROMEO",
    "SUZUKI", "ACURA", "LINCOLN", "VAZ", "GAZ", "CITROEN", "LAND ROVER", "MINI", "DODGE",
    "CHRYSLER", "JAGUAR", "ISUZU", "SKODA", "DAIHATSU", "BUICK", "TESLA", "CADILLAC",
    "PEUGEOT", "BENTLEY", "VOLVO", "სხვა", "HAVAL", "HUMMER", "SCION", "UAZ", "MERCURY",
    "ZAZ", "ROVER", "SEAT", "LANCIA", "MOSKVICH", "MASERATI", "FERRARI", "SAAB",
    "LAMBORGHINI", "ROLLS-ROYCE", "PONTIAC", "SATURN", "ASTON MARTIN", "GREATWALL",
];

pub const CATEGORIES: &[&str] = &[
    "Jeep", "Hatchback", "Sedan", "Microbus", "Goods wagon", "Universal", "Coupe", "Minivan",
    "Cabriolet", "Limousine", "Pickup",
];

pub const LEATHER_OPTIONS: &[&str] = &["Yes", "No"];

pub const FUEL_TYPES: &[&str] = &[
    "Hybrid", "Petrol", "Diesel", "CNG", "Plug-in Hybrid", "LPG", "Hydrogen",
];

pub const GEAR_BOX_TYPES: &[&str] = &["Automatic", "Tiptronic", "Variator", "Manual"];

pub const DRIVE_WHEEL_TYPES: &[&str] = &["4x4", "Front", "Rear"];

pub const DOOR_OPTIONS: &[&str] = &["2", "4", ">5"];

pub const WHEEL_SIDES: &[&str] = &["Left wheel", "Right-hand drive"];

/// Values offered to users for the closed categorical fields.
///
/// Informational only: the encoder artifact decides what is known. Model and
/// Color are free text and have no display domain.
pub fn display_domain(name: &str) -> Option<&'static [&'static str]> {
    match name {
        MANUFACTURER => Some(MANUFACTURERS),
        CATEGORY => Some(CATEGORIES),
        LEATHER_INTERIOR => Some(LEATHER_OPTIONS),
        FUEL_TYPE => Some(FUEL_TYPES),
        GEAR_BOX_TYPE => Some(GEAR_BOX_TYPES),
        DRIVE_WHEELS => Some(DRIVE_WHEEL_TYPES),
        DOORS => Some(DOOR_OPTIONS),
        WHEEL => Some(WHEEL_SIDES),
        _ => None,
    }
}

/// Returns the first position where `actual` departs from `expected`.
pub(crate) fn first_order_mismatch<S: AsRef<str>>(
    expected: &[&str],
    actual: &[S],
) -> Option<(usize, String, String)> {
    let len = expected.len().max(actual.len());
    (0..len).find_map(|i| {
        let want = expected.get(i).copied().unwrap_or("<none>");
        let got = actual.get(i).map(|s| s.as_ref()).unwrap_or("<none>");
        (want != got).then(|| (i, want.to_string(), got.to_string()))
    })
}
