//! Catalogue of recognizer-provided ("prebuilt") entity categories.

pub const PREFIX: &str = "builtin.";

pub const NUMBER: &str = "builtin.number";
pub const ORDINAL: &str = "builtin.ordinal";
pub const PERCENTAGE: &str = "builtin.percentage";
pub const TEMPERATURE: &str = "builtin.temperature";
pub const DIMENSION: &str = "builtin.dimension";
pub const MONEY: &str = "builtin.money";
pub const AGE: &str = "builtin.age";
pub const EMAIL: &str = "builtin.email";
pub const URL: &str = "builtin.url";
pub const PHONE_NUMBER: &str = "builtin.phonenumber";
pub const DATETIME: &str = "builtin.datetime";
pub const DATETIME_V2_DATE: &str = "builtin.datetimeV2.date";
pub const DATETIME_V2_TIME: &str = "builtin.datetimeV2.time";
pub const DATETIME_V2_DATERANGE: &str = "builtin.datetimeV2.daterange";
pub const GEOGRAPHY_CITY: &str = "builtin.geography.city";
pub const GEOGRAPHY_COUNTRY: &str = "builtin.geography.country";
pub const ENCYCLOPEDIA: &str = "builtin.encyclopedia";

/// Short category names some recognizers emit without the prefix.
const BARE_NAMES: &[&str] = &[
    "number",
    "ordinal",
    "percentage",
    "temperature",
    "dimension",
    "money",
    "age",
    "email",
    "url",
    "phonenumber",
    "date",
    "time",
    "datetime",
    "datetimev2",
    "geography",
];

pub fn is_builtin(entity_type: &str) -> bool {
    if entity_type.starts_with(PREFIX) {
        return true;
    }
    let lower = entity_type.to_ascii_lowercase();
    BARE_NAMES.iter().any(|name| *name == lower)
}
