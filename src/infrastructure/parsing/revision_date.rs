//! Revision date normalization
//!
//! Converts a labeled date value into `YYYY-MM-DD`. Formats are tried in
//! configured order; when none fits, a plausible 4-digit year degrades to
//! January 1st of that year.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DIGIT_RUN: Regex = Regex::new(r"[0-9]+").expect("static digit pattern");
}

/// Parses `text` against `formats`, falling back to a bare year in
/// `min_year..=max_year`. Returns `None` if neither applies.
pub fn parse_revision_date(text: &str, formats: &[String], min_year: i32, max_year: i32) -> Option<String> {
    let trimmed = text.trim();

    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }

    year_fallback(trimmed, min_year, max_year)
}

fn year_fallback(text: &str, min_year: i32, max_year: i32) -> Option<String> {
    DIGIT_RUN
        .find_iter(text)
        .filter(|m| m.as_str().len() == 4)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .find(|year| (min_year..=max_year).contains(year))
        .map(|year| format!("{year:04}-01-01"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::parsing::config::MonographParsingConfig;
    use rstest::rstest;

    fn parse(text: &str) -> Option<String> {
        let config = MonographParsingConfig::default();
        parse_revision_date(text, &config.date_formats, config.min_year, config.max_year)
    }

    #[rstest]
    #[case("2023-05-14", "2023-05-14")]
    #[case("14-May-2023", "2023-05-14")]
    #[case("14-September-2021", "2021-09-14")]
    #[case("2023/05/14", "2023-05-14")]
    #[case("14/05/2023", "2023-05-14")]
    #[case("  2020-02-29 ", "2020-02-29")]
    fn listed_formats_parse(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parse(input).as_deref(), Some(expected));
    }

    #[test]
    fn slash_dates_are_day_first() {
        // 05/14/2023 would be valid month-first; day-first makes it invalid
        // and the year fallback takes over.
        assert_eq!(parse("05/12/2023").as_deref(), Some("2023-12-05"));
        assert_eq!(parse("05/14/2023").as_deref(), Some("2023-01-01"));
    }

    #[test]
    fn bare_year_degrades_to_january_first() {
        assert_eq!(parse("...updated in 2021...").as_deref(), Some("2021-01-01"));
        assert_eq!(parse("May 2019").as_deref(), Some("2019-01-01"));
    }

    #[test]
    fn out_of_range_or_missing_year_is_absent() {
        assert_eq!(parse("no date here"), None);
        assert_eq!(parse("version 3100 build"), None);
        assert_eq!(parse("ref 12345678"), None);
    }

    #[test]
    fn first_plausible_year_wins() {
        assert_eq!(parse("rev 3000 then 1999 2000").as_deref(), Some("1999-01-01"));
    }
}
