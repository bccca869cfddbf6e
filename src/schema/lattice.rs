//! Column type lattice
//!
//! Decides how a column's type changes when one more raw value is seen.
//! Types widen `unknown -> {int -> long -> double, bool, datetime, localtime} -> string`
//! and never narrow.

use crate::types::ColumnType;
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_INT: i64 = i32::MAX as i64;
const MIN_INT: i64 = i32::MIN as i64;

// Pre-compiled regex patterns for performance
static DATE_TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}-[0-1][0-9]-[0-3][0-9][ T][0-2][0-9]:[0-5][0-9]:[0-6][0-9](?:\.[0-9]{1,9})?(?: [a-zA-Z]+)?$").unwrap()
});

static LOCAL_TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+T)?([0-9]+):([0-9]+)(:[0-9]+)?(?:\.[0-9]{1,9})?$").unwrap()
});

static DECIMAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?$").unwrap()
});

static INTEGRAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?[0-9]+$").unwrap()
});

/// Widen `current` so that it also describes `value`.
///
/// Empty values and values equal to `null_string` carry no type information and
/// leave `current` unchanged.
pub fn determine_type(value: &str, current: ColumnType, null_string: Option<&str>) -> ColumnType {
    if value.is_empty() || Some(value) == null_string {
        return current;
    }

    match current {
        // Strings never get promoted
        ColumnType::String => ColumnType::String,
        ColumnType::Integer => check_integer(value),
        ColumnType::Long => check_long(value),
        ColumnType::Double => check_double(value),
        ColumnType::Boolean => check_boolean(value),
        ColumnType::DateTime => check_date_time(value),
        ColumnType::LocalTime => check_local_time(value),
        ColumnType::Unknown => type_from_unknown(value),
    }
}

/// Re-check a value in an `int` column
pub fn check_integer(value: &str) -> ColumnType {
    match numeric_text(value) {
        Some(number) => number_type(&number),
        None => ColumnType::String,
    }
}

/// Re-check a value in a `long` column. A long never goes back to int.
pub fn check_long(value: &str) -> ColumnType {
    match numeric_text(value) {
        Some(number) if INTEGRAL_REGEX.is_match(&number) => ColumnType::Long,
        Some(_) => ColumnType::Double,
        None => ColumnType::String,
    }
}

pub fn check_double(value: &str) -> ColumnType {
    match numeric_text(value) {
        Some(_) => ColumnType::Double,
        None => ColumnType::String,
    }
}

pub fn check_boolean(value: &str) -> ColumnType {
    if is_boolean(value) {
        ColumnType::Boolean
    } else {
        ColumnType::String
    }
}

pub fn check_date_time(value: &str) -> ColumnType {
    if DATE_TIME_REGEX.is_match(value) {
        ColumnType::DateTime
    } else {
        ColumnType::String
    }
}

pub fn check_local_time(value: &str) -> ColumnType {
    if LOCAL_TIME_REGEX.is_match(value) {
        ColumnType::LocalTime
    } else {
        ColumnType::String
    }
}

/// Classify the first non-null value of a column
fn type_from_unknown(value: &str) -> ColumnType {
    if let Some(number) = numeric_text(value) {
        return number_type(&number);
    }

    if is_boolean(value) {
        return ColumnType::Boolean;
    }

    if DATE_TIME_REGEX.is_match(value) {
        return ColumnType::DateTime;
    }

    if LOCAL_TIME_REGEX.is_match(value) {
        return ColumnType::LocalTime;
    }

    ColumnType::String
}

/// Narrowest numeric type for text already known to be numeric
fn number_type(number: &str) -> ColumnType {
    if !INTEGRAL_REGEX.is_match(number) {
        return ColumnType::Double;
    }

    match number.parse::<i64>() {
        Ok(n) if (MIN_INT..=MAX_INT).contains(&n) => ColumnType::Integer,
        // Too wide for i32, or even for i64
        _ => ColumnType::Long,
    }
}

/// Strip grouping commas and surrounding whitespace, returning the text if what is
/// left is a finite decimal number. `Infinity`, `NaN` and friends are not numbers here.
pub(crate) fn numeric_text(value: &str) -> Option<String> {
    let stripped: String = value.chars().filter(|&c| c != ',').collect();
    let trimmed = stripped.trim();
    // A literal that overflows f64 has no finite value to store
    if DECIMAL_REGEX.is_match(trimmed) && trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

fn is_boolean(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ColumnType::*;

    const NULL_STRING: Option<&str> = Some("(null)");

    // Integer is the most complicated case because it may be promoted to long or double
    #[test]
    fn test_check_integer() {
        assert_eq!(check_integer("hello"), String);
        assert_eq!(check_integer("true"), String);
        assert_eq!(check_integer("Infinity"), String);
        assert_eq!(check_integer("-Infinity"), String);
        assert_eq!(check_integer("NaN"), String);
        assert_eq!(check_integer("123"), Integer);
        assert_eq!(check_integer("123,456"), Integer);
        assert_eq!(check_integer("-123,456"), Integer);
        assert_eq!(check_integer("123.4"), Double);
        assert_eq!(check_integer("-123.4"), Double);
        assert_eq!(check_integer("1e5"), Double);
        assert_eq!(check_integer("1234567890123456789"), Long);
        assert_eq!(check_integer("-1234567890123456789"), Long);
        assert_eq!(check_integer("123456789012345678901234"), Long);
    }

    #[test]
    fn test_integer_boundaries() {
        assert_eq!(check_integer("2147483647"), Integer);
        assert_eq!(check_integer("-2147483648"), Integer);
        assert_eq!(check_integer("2147483648"), Long);
        assert_eq!(check_integer("-2147483649"), Long);

        for i in 1..=100i64 {
            assert_eq!(check_integer(&(MAX_INT + i).to_string()), Long);
            assert_eq!(check_integer(&(MAX_INT - i).to_string()), Integer);
            assert_eq!(check_integer(&(MIN_INT - i).to_string()), Long);
            assert_eq!(check_integer(&(MIN_INT + i).to_string()), Integer);
        }

        assert_eq!(determine_type("2147483647", Unknown, NULL_STRING), Integer);
        assert_eq!(determine_type("2147483648", Unknown, NULL_STRING), Long);
    }

    // A long can only be promoted to a double, never demoted to int
    #[test]
    fn test_check_long() {
        assert_eq!(check_long("hello"), String);
        assert_eq!(check_long("-Infinity"), String);
        assert_eq!(check_long("123"), Long);
        assert_eq!(check_long("123,456"), Long);
        assert_eq!(check_long("-123"), Long);
        assert_eq!(check_long("123.4"), Double);
        assert_eq!(check_long("2147483647"), Long);
        assert_eq!(check_long("-2147483648"), Long);
    }

    #[test]
    fn test_check_double() {
        assert_eq!(check_double("hello"), String);
        assert_eq!(check_double("Infinity"), String);
        assert_eq!(check_double("123"), Double);
        assert_eq!(check_double("-123,456"), Double);
        assert_eq!(check_double("0.0000"), Double);
        assert_eq!(check_double("-0.0001"), Double);
        assert_eq!(check_double("123e5"), Double);
        assert_eq!(check_double("123e-5"), Double);
        assert_eq!(check_double("1e400"), String);
        assert_eq!(check_double("-1e400"), String);
        assert_eq!(check_double("1e-400"), Double);
    }

    #[test]
    fn test_overflowing_number_is_string() {
        let huge = "9".repeat(400);
        assert_eq!(determine_type(&huge, Unknown, NULL_STRING), String);
        assert_eq!(determine_type(&huge, Long, NULL_STRING), String);
        assert_eq!(determine_type("1e400", Integer, NULL_STRING), String);
        assert_eq!(determine_type("1e400", Double, NULL_STRING), String);
    }

    #[test]
    fn test_check_boolean() {
        assert_eq!(check_boolean("true"), Boolean);
        assert_eq!(check_boolean("FALSE"), Boolean);
        assert_eq!(check_boolean("hello"), String);
        assert_eq!(check_boolean("123"), String);
    }

    #[test]
    fn test_check_date_time() {
        assert_eq!(check_date_time("2020-01-02T03:04:05.123456789 UTC"), DateTime);
        assert_eq!(check_date_time("2020-01-02 03:04:05.123456789"), DateTime);
        assert_eq!(check_date_time("2020-01-02 03:04:05 UTC"), DateTime);
        assert_eq!(check_date_time("2020-01-02T03:04:05.1 LON"), DateTime);
        assert_eq!(check_date_time("1945-06-15 24:59:59"), DateTime);

        assert_eq!(check_date_time("2020-01-02T03:04:05.1234567890 UTC"), String);
        assert_eq!(check_date_time("2020-01-02"), String);
        assert_eq!(check_date_time("03:04:05"), String);
        assert_eq!(check_date_time("1990-20-01T00:00:00.123456789 UTC"), String);
        assert_eq!(check_date_time("1990-01-01T00:60:00.123456789 UTC"), String);
        assert_eq!(check_date_time("1990-01-0100:00:00.123456789 UTC"), String);
    }

    #[test]
    fn test_check_local_time() {
        assert_eq!(check_local_time("03:04:05"), LocalTime);
        assert_eq!(check_local_time("03:04:05.123456789"), LocalTime);
        assert_eq!(check_local_time("03:04"), LocalTime);
        assert_eq!(check_local_time("123"), String);
        assert_eq!(check_local_time("03:04:05.1234567890"), String);
    }

    #[test]
    fn test_null_does_not_change_type() {
        for ty in ColumnType::ALL {
            assert_eq!(determine_type("", ty, NULL_STRING), ty);
            assert_eq!(determine_type("(null)", ty, NULL_STRING), ty);
        }
    }

    #[test]
    fn test_determine_type_from_unknown() {
        assert_eq!(determine_type("hello", Unknown, NULL_STRING), String);
        assert_eq!(determine_type("123a", Unknown, NULL_STRING), String);
        assert_eq!(determine_type("truea", Unknown, NULL_STRING), String);
        assert_eq!(determine_type("TRUE", Unknown, NULL_STRING), Boolean);
        assert_eq!(determine_type("0", Unknown, NULL_STRING), Integer);
        assert_eq!(determine_type("-123", Unknown, NULL_STRING), Integer);
        assert_eq!(determine_type("1.5", Unknown, NULL_STRING), Double);
        assert_eq!(determine_type("2020-01-02 03:04:05", Unknown, NULL_STRING), DateTime);
        assert_eq!(determine_type("03:04:05", Unknown, NULL_STRING), LocalTime);
        assert_eq!(determine_type("Infinity", Unknown, NULL_STRING), String);
    }

    #[test]
    fn test_types_never_narrow() {
        let values = [
            "1", "2147483648", "3", "4.5", "6", "x", "7", "true", "", "(null)",
        ];
        let mut ty = Unknown;
        for value in values {
            let next = determine_type(value, ty, NULL_STRING);
            assert!(next.is_at_least(ty), "{:?} -> {:?} on {:?}", ty, next, value);
            ty = next;
        }
        assert_eq!(ty, String);
    }

    #[test]
    fn test_unknown_to_integer_to_long() {
        let mut ty = Unknown;
        ty = determine_type("100", ty, NULL_STRING);
        assert_eq!(ty, Integer);
        ty = determine_type("99999999999", ty, NULL_STRING);
        assert_eq!(ty, Long);
    }
}
