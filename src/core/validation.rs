//! User input validation and normalisation
//!
//! Free-text answers collected by the dialogue flows are noisy: stray
//! whitespace, inconsistent case, phone numbers with punctuation. Every
//! check here returns plain data; turning a failed check into a re-prompt
//! is the flow's job.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::error::{AppError, AppResult};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("static regex"));

/// Date format users type in custom statistic periods (`ДД-ММ-ГГГГ`)
pub const DATE_INPUT_FORMAT: &str = "%d-%m-%Y";

/// Date format shown back to users
pub const DATE_OUTPUT_FORMAT: &str = "%d/%m/%Y";

/// Checks that the whole string parses as an integer.
pub fn check_integer(value: &str) -> bool {
    value.trim().parse::<i64>().is_ok()
}

/// Parses an integer answer or fails with a validation error.
pub fn parse_integer(value: &str) -> AppResult<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("not an integer: {value}")))
}

/// Checks a RU mobile number stripped to digits: either `9xxxxxxxxx`
/// or an 11-digit form starting with `79`/`89`.
pub fn check_phone(digits: &str) -> bool {
    match digits.len() {
        10 => digits.starts_with('9'),
        11 => digits.starts_with("79") || digits.starts_with("89"),
        _ => false,
    }
}

/// Strips everything but digits from a phone answer.
pub fn clean_phone(raw: &str) -> String {
    NON_DIGIT.replace_all(raw, "").into_owned()
}

/// Normalises a valid phone to the canonical `7xxxxxxxxxx` form.
pub fn standardize_phone(digits: &str) -> String {
    if digits.len() == 10 {
        format!("7{digits}")
    } else {
        format!("7{}", &digits[1..])
    }
}

/// Splits a free-text answer on `delimiter`, collapsing whitespace and
/// capitalising each element ("терапевт ,  хирург" → ["Терапевт", "Хирург"]).
pub fn normalize_input(raw: &str, delimiter: char) -> Vec<String> {
    let collapsed = WHITESPACE.replace_all(raw, " ");
    collapsed
        .trim()
        .trim_matches(delimiter)
        .to_lowercase()
        .split(delimiter)
        .map(str::trim)
        .filter(|el| !el.is_empty())
        .map(capitalize)
        .collect()
}

/// Uppercases the first character, keeping the rest intact.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Shortens "Иванов Иван Иванович" to "Иванов И.И." for button labels.
pub fn transform_name(full_name: &str) -> String {
    let mut parts = full_name.split_whitespace();
    let mut short = match parts.next() {
        Some(surname) => format!("{surname} "),
        None => return String::new(),
    };
    for name in parts {
        if let Some(initial) = name.chars().next() {
            short.push(initial);
            short.push('.');
        }
    }
    short
}

/// Parses a custom statistic period: two `DD-MM-YYYY` dates separated by
/// whitespace, order-normalised so the smaller date becomes the start.
pub fn parse_period(raw: &str) -> AppResult<(NaiveDateTime, NaiveDateTime)> {
    let collapsed = WHITESPACE.replace_all(raw.trim(), " ");
    let mut dates = collapsed
        .split(' ')
        .map(|part| NaiveDate::parse_from_str(part, DATE_INPUT_FORMAT))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| AppError::Validation(format!("malformed period: {raw}")))?;
    if dates.len() != 2 {
        return Err(AppError::Validation(format!("expected two dates, got {}", dates.len())));
    }
    dates.sort();
    Ok((
        dates[0].and_hms_opt(0, 0, 0).unwrap_or_default(),
        dates[1].and_hms_opt(0, 0, 0).unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_check_accepts_signed_values() {
        assert!(check_integer("42"));
        assert!(check_integer(" -7 "));
        assert!(!check_integer("42.5"));
        assert!(!check_integer("сорок два"));
    }

    #[test]
    fn phone_check_matches_ru_mobile_forms() {
        assert!(check_phone("9261234567"));
        assert!(check_phone("79261234567"));
        assert!(check_phone("89261234567"));
        assert!(!check_phone("69261234567"));
        assert!(!check_phone("926123456"));
        assert!(!check_phone("109261234567"));
    }

    #[test]
    fn phone_standardizes_to_seven_prefix() {
        assert_eq!(standardize_phone("9261234567"), "79261234567");
        assert_eq!(standardize_phone("89261234567"), "79261234567");
        assert_eq!(standardize_phone("79261234567"), "79261234567");
    }

    #[test]
    fn clean_phone_strips_punctuation() {
        assert_eq!(clean_phone("+7 (926) 123-45-67"), "79261234567");
    }

    #[test]
    fn normalize_splits_and_capitalizes() {
        assert_eq!(
            normalize_input("  терапевт ,хирург,  ЛОР  ", ','),
            vec!["Терапевт", "Хирург", "Лор"]
        );
        assert_eq!(normalize_input("иванов  иван", ' '), vec!["Иванов", "Иван"]);
    }

    #[test]
    fn transform_name_shortens_to_initials() {
        assert_eq!(transform_name("Иванов Иван Иванович"), "Иванов И.И.");
        assert_eq!(transform_name("Петров"), "Петров ");
    }

    #[test]
    fn period_parses_and_orders_dates() {
        let (start, end) = parse_period("05-03-2024  01-02-2024").unwrap();
        assert_eq!(start.date().format(DATE_INPUT_FORMAT).to_string(), "01-02-2024");
        assert_eq!(end.date().format(DATE_INPUT_FORMAT).to_string(), "05-03-2024");
    }

    #[test]
    fn period_rejects_garbage() {
        assert!(parse_period("01-02-2024").is_err());
        assert!(parse_period("01.02.2024 05.03.2024").is_err());
        assert!(parse_period("вчера сегодня").is_err());
    }
}
