//! Culture-aware parsing of primitive step arguments.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use unic_langid::LanguageIdentifier;

use super::ConversionError;
use crate::bindings::{ArgValue, BindingType};

const COMMA_DECIMAL_LANGUAGES: &[&str] = &[
    "bg", "cs", "da", "de", "el", "es", "et", "fi", "fr", "hr", "hu", "id", "it", "lt", "lv", "nb",
    "nl", "nn", "pl", "pt", "ro", "ru", "sk", "sl", "sr", "sv", "tr", "uk", "vi",
];

const YEAR_FIRST_LANGUAGES: &[&str] = &["hu", "ja", "ko", "lt", "mn", "zh"];

const MONTH_FIRST_DATES: &[&str] = &["%m/%d/%Y", "%m-%d-%Y"];
const YEAR_FIRST_DATES: &[&str] = &["%Y/%m/%d", "%Y.%m.%d", "%Y. %m. %d."];
const DAY_FIRST_DATES: &[&str] = &["%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y"];

const TIMES: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];
const ISO_DATE_TIMES: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn region(culture: &LanguageIdentifier) -> Option<&str> {
    culture.region.as_ref().map(|region| region.as_str())
}

fn uses_decimal_comma(culture: &LanguageIdentifier) -> bool {
    let language = culture.language.as_str();
    match (language, region(culture)) {
        ("de", Some("CH" | "LI")) | ("es", Some("MX" | "US")) => false,
        _ => COMMA_DECIMAL_LANGUAGES.contains(&language),
    }
}

/// Rewrite a culture-formatted number into Rust's float syntax.
///
/// Group separators, including spaces and apostrophes, are dropped.
fn normalise_float(text: &str, culture: &LanguageIdentifier) -> String {
    let (decimal, group) = if uses_decimal_comma(culture) {
        (',', '.')
    } else {
        ('.', ',')
    };
    text.trim()
        .chars()
        .filter(|c| *c != group && *c != '\'' && !c.is_whitespace())
        .map(|c| if c == decimal { '.' } else { c })
        .collect()
}

fn date_formats(culture: &LanguageIdentifier) -> &'static [&'static str] {
    let language = culture.language.as_str();
    if language == "en" && matches!(region(culture), None | Some("US" | "PH")) {
        MONTH_FIRST_DATES
    } else if YEAR_FIRST_LANGUAGES.contains(&language) {
        YEAR_FIRST_DATES
    } else {
        DAY_FIRST_DATES
    }
}

pub(super) fn parse_date(text: &str, culture: &LanguageIdentifier) -> Option<NaiveDate> {
    let text = text.trim();
    std::iter::once("%Y-%m-%d")
        .chain(date_formats(culture).iter().copied())
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

pub(super) fn parse_date_time(text: &str, culture: &LanguageIdentifier) -> Option<NaiveDateTime> {
    let text = text.trim();
    ISO_DATE_TIMES
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            date_formats(culture).iter().find_map(|date| {
                TIMES.iter().find_map(|time| {
                    NaiveDateTime::parse_from_str(text, &format!("{date} {time}")).ok()
                })
            })
        })
        .or_else(|| parse_date(text, culture).map(|date| date.and_time(NaiveTime::MIN)))
}

fn boxed<T: Send + Sync + 'static>(value: T) -> ArgValue {
    Box::new(value)
}

fn invalid(text: &str, target: &BindingType, reason: impl ToString) -> ConversionError {
    ConversionError::InvalidValue {
        value: text.to_owned(),
        target: target.name().to_owned(),
        reason: reason.to_string(),
    }
}

macro_rules! parse_integers {
    ($target:expr, $text:expr, $($ty:ty),+ $(,)?) => {
        $(
            if $target.is::<$ty>() {
                return $text
                    .trim()
                    .parse::<$ty>()
                    .map(boxed)
                    .map_err(|err| invalid($text, $target, err));
            }
        )+
    };
}

macro_rules! parse_floats {
    ($target:expr, $text:expr, $culture:expr, $($ty:ty),+ $(,)?) => {
        $(
            if $target.is::<$ty>() {
                return normalise_float($text, $culture)
                    .parse::<$ty>()
                    .map(boxed)
                    .map_err(|err| invalid($text, $target, err));
            }
        )+
    };
}

/// Parse `text` into the primitive `target` type under `culture`.
pub(super) fn parse_primitive(
    target: &BindingType,
    text: &str,
    culture: &LanguageIdentifier,
) -> Result<ArgValue, ConversionError> {
    parse_integers!(
        target, text, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize
    );
    parse_floats!(target, text, culture, f32, f64);
    if target.is::<String>() {
        return Ok(boxed(text.to_owned()));
    }
    if target.is::<bool>() {
        let trimmed = text.trim();
        return if trimmed.eq_ignore_ascii_case("true") {
            Ok(boxed(true))
        } else if trimmed.eq_ignore_ascii_case("false") {
            Ok(boxed(false))
        } else {
            Err(invalid(text, target, "expected true or false"))
        };
    }
    if target.is::<char>() {
        let mut chars = text.chars();
        return match (chars.next(), chars.next()) {
            (Some(single), None) => Ok(boxed(single)),
            _ => Err(invalid(text, target, "expected exactly one character")),
        };
    }
    if target.is::<NaiveDate>() {
        return parse_date(text, culture)
            .map(boxed)
            .ok_or_else(|| invalid(text, target, format!("not a date in {culture}")));
    }
    if target.is::<NaiveDateTime>() {
        return parse_date_time(text, culture)
            .map(boxed)
            .ok_or_else(|| invalid(text, target, format!("not a date and time in {culture}")));
    }
    Err(ConversionError::Unsupported {
        value: text.to_owned(),
        target: target.name().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use unic_langid::langid;

    fn parsed<T: Copy + Send + Sync + 'static>(text: &str, culture: &LanguageIdentifier) -> Option<T> {
        parse_primitive(&BindingType::of::<T>(), text, culture)
            .ok()
            .and_then(|value| value.downcast_ref::<T>().copied())
    }

    #[rstest]
    #[case(langid!("en-US"), "1,234.5", 1234.5)]
    #[case(langid!("de-DE"), "1.234,5", 1234.5)]
    #[case(langid!("fr-FR"), "1 234,5", 1234.5)]
    #[case(langid!("de-CH"), "1'234.5", 1234.5)]
    fn floats_follow_culture(
        #[case] culture: LanguageIdentifier,
        #[case] text: &str,
        #[case] expected: f64,
    ) {
        assert_eq!(parsed::<f64>(text, &culture), Some(expected));
    }

    #[test]
    fn integers_reject_group_separators() {
        let culture = langid!("en-US");
        assert_eq!(parsed::<i32>(" -42 ", &culture), Some(-42));
        assert_eq!(parsed::<i32>("1,000", &culture), None);
        assert_eq!(parsed::<u8>("256", &culture), None);
    }

    #[test]
    fn booleans_and_chars() {
        let culture = langid!("en-US");
        assert_eq!(parsed::<bool>("TRUE", &culture), Some(true));
        assert_eq!(parsed::<bool>("yes", &culture), None);
        assert_eq!(parsed::<char>("x", &culture), Some('x'));
        assert_eq!(parsed::<char>("xy", &culture), None);
    }

    #[rstest]
    #[case(langid!("en-US"), "03/05/2024", NaiveDate::from_ymd_opt(2024, 3, 5))]
    #[case(langid!("en-GB"), "03/05/2024", NaiveDate::from_ymd_opt(2024, 5, 3))]
    #[case(langid!("de-DE"), "05.03.2024", NaiveDate::from_ymd_opt(2024, 3, 5))]
    #[case(langid!("ja-JP"), "2024/03/05", NaiveDate::from_ymd_opt(2024, 3, 5))]
    #[case(langid!("de-DE"), "2024-03-05", NaiveDate::from_ymd_opt(2024, 3, 5))]
    fn dates_follow_culture(
        #[case] culture: LanguageIdentifier,
        #[case] text: &str,
        #[case] expected: Option<NaiveDate>,
    ) {
        assert_eq!(parse_date(text, &culture), expected);
    }

    #[test]
    fn date_only_values_are_midnight() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).map(|date| date.and_time(NaiveTime::MIN));
        assert_eq!(parse_date_time("2024-03-05", &langid!("en-US")), expected);
    }

    #[test]
    fn date_times_accept_culture_dates_with_times() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).and_then(|date| date.and_hms_opt(14, 30, 0));
        assert_eq!(parse_date_time("05.03.2024 14:30", &langid!("de-DE")), expected);
        assert_eq!(parse_date_time("03/05/2024 2:30 PM", &langid!("en-US")), expected);
    }

    #[test]
    fn unknown_targets_are_unsupported() {
        struct Basket;
        let err = parse_primitive(&BindingType::of::<Basket>(), "x", &langid!("en-US"));
        assert!(matches!(err, Err(ConversionError::Unsupported { .. })));
    }
}
