//! Locale-independent calendar helpers.
//!
//! File names and title lines always use English month names, whatever the
//! host locale says.

use chrono::{Datelike, NaiveDate};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// English name for a 1-based month number. Out-of-range input is clamped.
pub fn month_name(month: u32) -> &'static str {
    let idx = month.clamp(1, 12) as usize - 1;
    MONTH_NAMES[idx]
}

/// English month name of `date`.
pub fn month_name_of(date: NaiveDate) -> &'static str {
    month_name(date.month())
}

/// True when both dates fall in the same calendar month of the same year.
pub fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// A date cell pattern such as `MM/DD` or `YYYY-MM-DD`.
///
/// Recognised tokens: `YYYY`, `YY`, `MM`, `DD`. Everything else is copied
/// literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    pattern: String,
    strftime: String,
}

impl DateFormat {
    pub fn new(pattern: &str) -> Result<Self, String> {
        if !pattern.contains("MM") || !pattern.contains("DD") {
            return Err(format!(
                "date_format {pattern:?} must contain both MM and DD"
            ));
        }
        if pattern.contains('|') {
            return Err(format!("date_format {pattern:?} must not contain '|'"));
        }

        let mut strftime = String::with_capacity(pattern.len() + 4);
        let mut rest = pattern;
        while !rest.is_empty() {
            if let Some(tail) = rest.strip_prefix("YYYY") {
                strftime.push_str("%Y");
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("YY") {
                strftime.push_str("%y");
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("MM") {
                strftime.push_str("%m");
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("DD") {
                strftime.push_str("%d");
                rest = tail;
            } else {
                let ch = rest.chars().next().unwrap_or_default();
                if ch == '%' {
                    strftime.push_str("%%");
                } else {
                    strftime.push(ch);
                }
                rest = &rest[ch.len_utf8()..];
            }
        }

        Ok(Self {
            pattern: pattern.to_string(),
            strftime,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn format(&self, date: NaiveDate) -> String {
        date.format(&self.strftime).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_names_are_english() {
        assert_eq!(month_name(1), "January");
        assert_eq!(month_name(12), "December");
        assert_eq!(month_name_of(d(2026, 10, 17)), "October");
    }

    #[test]
    fn same_month_checks_year_too() {
        assert!(same_month(d(2026, 10, 1), d(2026, 10, 31)));
        assert!(!same_month(d(2025, 10, 1), d(2026, 10, 1)));
        assert!(!same_month(d(2026, 9, 30), d(2026, 10, 1)));
    }

    #[test]
    fn default_pattern_formats_month_day() {
        let fmt = DateFormat::new("MM/DD").unwrap();
        assert_eq!(fmt.format(d(2026, 3, 7)), "03/07");
    }

    #[test]
    fn iso_pattern_and_literals() {
        let fmt = DateFormat::new("YYYY-MM-DD").unwrap();
        assert_eq!(fmt.format(d(2026, 3, 7)), "2026-03-07");

        let fmt = DateFormat::new("DD.MM.YY %").unwrap();
        assert_eq!(fmt.format(d(2026, 3, 7)), "07.03.26 %");
    }

    #[test]
    fn pattern_requires_month_and_day() {
        assert!(DateFormat::new("YYYY").is_err());
        assert!(DateFormat::new("MM|DD").is_err());
    }
}
