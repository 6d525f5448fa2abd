//! Date standardization.
//!
//! A standardized date is `YYYYMMDD`, two dates `YYYYMMDD,YYYYMMDD`, or a date plus its
//! derived range `YYYYMMDD,YYYYMMDD-YYYYMMDD`. Unknown month or day encode as `00`.

use lazy_static::lazy_static;
use regex::Regex;

use crate::text::fold_lower;

lazy_static! {
    static ref YEAR: Regex = Regex::new(r"^(\d{4})$").unwrap();
    static ref ISO: Regex = Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})$").unwrap();
    static ref US_NUMERIC: Regex = Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap();
    static ref EU_NUMERIC: Regex = Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").unwrap();
    static ref MONTH_YEAR: Regex = Regex::new(r"^([a-z]+)\.?\s+(\d{4})$").unwrap();
    static ref DAY_MONTH_YEAR: Regex =
        Regex::new(r"^(\d{1,2})\s+([a-z]+)\.?,?\s+(\d{4})$").unwrap();
    static ref MONTH_DAY_YEAR: Regex =
        Regex::new(r"^([a-z]+)\.?\s+(\d{1,2}),?\s+(\d{4})$").unwrap();
    static ref MODIFIER: Regex =
        Regex::new(r"^(abt|about|circa|ca|c|est|bef|before|aft|after)\.?\s+(.+)$").unwrap();
    static ref BETWEEN: Regex = Regex::new(r"^bet(?:ween)?\.?\s+(.+?)\s+and\s+(.+)$").unwrap();
    static ref FROM_TO: Regex = Regex::new(r"^from\s+(.+?)\s+to\s+(.+)$").unwrap();
    static ref TO: Regex = Regex::new(r"^(.+?)\s+to\s+(.+)$").unwrap();
    static ref DASH: Regex = Regex::new(r"^(.+?)\s*-\s*(.+)$").unwrap();
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// A calendar date; `month` and `day` are 0 when unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ymd {
    year: i32,
    month: u32,
    day: u32,
}

impl Ymd {
    fn encode(&self) -> String {
        format!("{:04}{:02}{:02}", self.year, self.month, self.day)
    }
}

fn month_number(word: &str) -> Option<u32> {
    if word.len() < 3 {
        return None;
    }
    if word == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(word))
        .map(|i| i as u32 + 1)
}

fn ymd(year: &str, month: u32, day: &str) -> Option<Ymd> {
    let year: i32 = year.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    if year == 0 || month > 12 || day > 31 {
        return None;
    }
    Some(Ymd { year, month, day })
}

fn parse_single(text: &str) -> Option<Ymd> {
    if let Some(c) = YEAR.captures(text) {
        return ymd(&c[1], 0, "0");
    }
    if let Some(c) = ISO.captures(text) {
        return ymd(&c[1], c[2].parse().ok()?, &c[3]);
    }
    if let Some(c) = US_NUMERIC.captures(text) {
        return ymd(&c[3], c[1].parse().ok()?, &c[2]);
    }
    if let Some(c) = EU_NUMERIC.captures(text) {
        return ymd(&c[3], c[2].parse().ok()?, &c[1]);
    }
    if let Some(c) = MONTH_YEAR.captures(text) {
        return ymd(&c[2], month_number(&c[1])?, "0");
    }
    if let Some(c) = DAY_MONTH_YEAR.captures(text) {
        return ymd(&c[3], month_number(&c[2])?, &c[1]);
    }
    if let Some(c) = MONTH_DAY_YEAR.captures(text) {
        return ymd(&c[3], month_number(&c[1])?, &c[2]);
    }
    None
}

fn parse_pair(text: &str) -> Option<(Ymd, Ymd)> {
    for pattern in [&*BETWEEN, &*FROM_TO, &*TO, &*DASH] {
        if let Some(c) = pattern.captures(text) {
            if let (Some(a), Some(b)) = (parse_single(&c[1]), parse_single(&c[2])) {
                return Some((a, b));
            }
        }
    }
    None
}

/// Standardize a free-text date.
///
/// Returns an empty string when the text cannot be parsed.
///
/// # Examples
///
/// ```
/// use genealogy_search::standardize::standardize_date;
///
/// assert_eq!(standardize_date("19 Mar 1901"), "19010319");
/// assert_eq!(standardize_date("abt 1900"), "19000000,18980101-19021231");
/// assert_eq!(standardize_date("bet 1900 and 1902"), "19000000,19020000");
/// assert_eq!(standardize_date("sometime"), "");
/// ```
pub fn standardize_date(text: &str) -> String {
    let text = fold_lower(text);
    let text = text.trim().trim_end_matches('.').trim();
    if text.is_empty() {
        return String::new();
    }

    if let Some(date) = parse_single(text) {
        return date.encode();
    }

    if let Some(c) = MODIFIER.captures(text) {
        if let Some(date) = parse_single(&c[2]) {
            let (from, to) = match &c[1] {
                "bef" | "before" => (date.year - 10, date.year),
                "aft" | "after" => (date.year, date.year + 10),
                _ => (date.year - 2, date.year + 2),
            };
            return format!("{},{:04}0101-{:04}1231", date.encode(), from, to);
        }
    }

    match parse_pair(text) {
        Some((a, b)) => format!("{},{}", a.encode(), b.encode()),
        None => String::new(),
    }
}

/// Dates and years extracted from a standardized date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StdDate {
    pub dates: Vec<i32>,
    pub years: Vec<i32>,
}

fn parse_token(token: &str) -> Option<i32> {
    if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Parse a standardized date into its date and year lists.
///
/// Any malformed token rejects the whole value.
pub fn parse_std_date(std: &str) -> Option<StdDate> {
    let std = std.trim();
    let mut parts = std.split(',');
    let first = parse_token(parts.next()?)?;
    let second = parts.next();
    if parts.next().is_some() {
        return None;
    }

    match second {
        None => Some(StdDate {
            dates: vec![first],
            years: vec![first / 10000],
        }),
        Some(second) => match second.split_once('-') {
            Some((start, end)) => {
                let start = parse_token(start)? / 10000;
                let end = parse_token(end)? / 10000;
                if end < start {
                    return None;
                }
                Some(StdDate {
                    dates: vec![first],
                    years: (start..=end).collect(),
                })
            }
            None => {
                let second = parse_token(second)?;
                let mut years = vec![first / 10000];
                if second / 10000 != first / 10000 {
                    years.push(second / 10000);
                }
                Some(StdDate {
                    dates: vec![first, second],
                    years,
                })
            }
        },
    }
}

/// Render an encoded `YYYYMMDD` value for display (`1901`, `Mar 1901`, `19 Mar 1901`).
pub fn display_date(encoded: i32) -> String {
    let year = encoded / 10000;
    let month = ((encoded / 100) % 100) as usize;
    let day = encoded % 100;
    let month_name = MONTHS.get(month.wrapping_sub(1)).map(|m| {
        let mut short = m[..3].to_string();
        short[..1].make_ascii_uppercase();
        short
    });
    match (month_name, day) {
        (None, _) => year.to_string(),
        (Some(m), 0) => format!("{} {}", m, year),
        (Some(m), d) => format!("{} {} {}", d, m, year),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_date() {
        let parsed = parse_std_date("19010319").unwrap();
        assert_eq!(parsed.dates, vec![19010319]);
        assert_eq!(parsed.years, vec![1901]);
    }

    #[test]
    fn test_parse_two_dates_same_year() {
        let parsed = parse_std_date("19010319,19010419").unwrap();
        assert_eq!(parsed.dates, vec![19010319, 19010419]);
        assert_eq!(parsed.years, vec![1901]);
    }

    #[test]
    fn test_parse_two_dates_different_years() {
        let parsed = parse_std_date("19010319,19020419").unwrap();
        assert_eq!(parsed.dates, vec![19010319, 19020419]);
        assert_eq!(parsed.years, vec![1901, 1902]);
    }

    #[test]
    fn test_parse_date_with_range() {
        let parsed = parse_std_date("19010319,18990101-19011231").unwrap();
        assert_eq!(parsed.dates, vec![19010319]);
        assert_eq!(parsed.years, vec![1899, 1900, 1901]);
    }

    #[test]
    fn test_malformed_tokens_fail_closed() {
        assert!(parse_std_date("").is_none());
        assert!(parse_std_date("1901").is_none());
        assert!(parse_std_date("19010319,abc").is_none());
        assert!(parse_std_date("19010319,19011231-18990101").is_none());
        assert!(parse_std_date("19010319,19010319,19010319").is_none());
    }

    #[test]
    fn test_standardize_single_forms() {
        assert_eq!(standardize_date("1901"), "19010000");
        assert_eq!(standardize_date("Mar 1901"), "19010300");
        assert_eq!(standardize_date("19 March 1901"), "19010319");
        assert_eq!(standardize_date("March 19, 1901"), "19010319");
        assert_eq!(standardize_date("1901-03-19"), "19010319");
        assert_eq!(standardize_date("1901/3/19"), "19010319");
        assert_eq!(standardize_date("3/19/1901"), "19010319");
        assert_eq!(standardize_date("19.3.1901"), "19010319");
        assert_eq!(standardize_date("  19 Sept. 1901 "), "19010919");
    }

    #[test]
    fn test_standardize_modifiers() {
        assert_eq!(standardize_date("about 1900"), "19000000,18980101-19021231");
        assert_eq!(standardize_date("bef. 1900"), "19000000,18900101-19001231");
        assert_eq!(standardize_date("after Mar 1900"), "19000300,19000101-19101231");
    }

    #[test]
    fn test_standardize_pairs() {
        assert_eq!(standardize_date("from 1900 to 1905"), "19000000,19050000");
        assert_eq!(standardize_date("1900 - 1905"), "19000000,19050000");
        assert_eq!(standardize_date("Jan 1900 to Feb 1900"), "19000100,19000200");
    }

    #[test]
    fn test_standardize_rejects_garbage() {
        assert_eq!(standardize_date(""), "");
        assert_eq!(standardize_date("unknown"), "");
        assert_eq!(standardize_date("Foo 1900"), "");
        assert_eq!(standardize_date("13/40/1900"), "");
    }

    #[test]
    fn test_standardized_values_parse() {
        let parsed = parse_std_date(&standardize_date("abt 1900")).unwrap();
        assert_eq!(parsed.years, vec![1898, 1899, 1900, 1901, 1902]);
    }

    #[test]
    fn test_display_date() {
        assert_eq!(display_date(19010000), "1901");
        assert_eq!(display_date(19010300), "Mar 1901");
        assert_eq!(display_date(19010319), "19 Mar 1901");
    }
}
