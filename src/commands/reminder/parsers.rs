//! Time phrases a reminder can be written with.
//!
//! A phrase may trail the reminder text ("pay rent in 3 days") or lead it
//! ("in 3 days pay rent"); either way it is separated from the text by
//! whitespace. All dates resolve in UTC.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeDelta, Utc, Weekday};
use regex::Regex;
use std::sync::LazyLock;

/// A reminder split into its text and the instant it is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub date_time: DateTime<Utc>,
    pub reminder: String,
}

/// Text plus the capture groups of the time phrase, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseMatch<'a> {
    pub text: &'a str,
    pub parts: Vec<Option<&'a str>>,
}

/// A time phrase pattern compiled for both placements.
pub struct TimePhrase {
    trailing: Regex,
    leading: Regex,
}

impl TimePhrase {
    pub fn new(time_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            trailing: Regex::new(&format!(r"(?s)^(.+)\s+{time_pattern}\s*$"))?,
            leading: Regex::new(&format!(r"(?s)^\s*{time_pattern}\s+(.+)$"))?,
        })
    }

    /// Match the phrase after the text, or before it when `leading` is set.
    pub fn exec<'a>(&self, message: &'a str, leading: bool) -> Option<PhraseMatch<'a>> {
        let regex = if leading { &self.leading } else { &self.trailing };
        let caps = regex.captures(message)?;
        let mut groups: Vec<Option<&'a str>> =
            caps.iter().skip(1).map(|g| g.map(|m| m.as_str())).collect();

        let text = if leading {
            groups.pop().flatten()?
        } else {
            groups.remove(0)?
        };
        Some(PhraseMatch {
            text,
            parts: groups,
        })
    }
}

type Resolver = fn(&[Option<&str>], DateTime<Utc>) -> Option<DateTime<Utc>>;

struct Parser {
    phrase: TimePhrase,
    resolve: Resolver,
}

static PARSERS: LazyLock<Vec<Parser>> = LazyLock::new(|| {
    let table: [(&str, Resolver); 5] = [
        (r"in (\d+\.?\d*) ([a-zA-Z]+)", resolve_in),
        (r"on ([a-zA-Z]{2,}) (\d+)(st|nd|rd|th)?", resolve_month_day),
        (r"on (\d+)(st|nd|rd|th)? (?:of )?([a-zA-Z]{3,})", resolve_day_month),
        (r"on (\d{1,2})\.(\d{1,2})(?:\.(\d{4}|\d{2}))?\.?", resolve_numeric_date),
        (r"on ([a-zA-Z]{3,9})", resolve_weekday),
    ];
    table
        .into_iter()
        .filter_map(|(pattern, resolve)| match TimePhrase::new(pattern) {
            Ok(phrase) => Some(Parser { phrase, resolve }),
            Err(e) => {
                tracing::error!("Invalid reminder pattern {}: {}", pattern, e);
                None
            }
        })
        .collect()
});

/// Split `message` into reminder text and due time, relative to `from`.
///
/// Phrase kinds are tried in a fixed order, trailing placement before
/// leading; the first one that resolves to a valid instant wins.
pub fn parse_reminder(message: &str, from: DateTime<Utc>) -> Option<ParseResult> {
    for parser in PARSERS.iter() {
        for leading in [false, true] {
            let Some(found) = parser.phrase.exec(message, leading) else {
                continue;
            };
            let reminder = found.text.trim();
            if reminder.is_empty() {
                continue;
            }
            if let Some(date_time) = (parser.resolve)(&found.parts, from) {
                return Some(ParseResult {
                    date_time,
                    reminder: reminder.to_string(),
                });
            }
        }
    }
    None
}

/// Whether `input` is a correctly suffixed ordinal, e.g. `1st`, `22nd`, `13th`.
pub fn is_valid_sequence_number(input: &str) -> bool {
    let Some(split) = input.len().checked_sub(2) else {
        return false;
    };
    if !input.is_char_boundary(split) {
        return false;
    }
    let (head, suffix) = input.split_at(split);
    if head.is_empty() || !head.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if head.trim_start_matches('0').is_empty() {
        return false;
    }

    let teens = head.len() >= 2 && matches!(&head[head.len() - 2..], "11" | "12" | "13");
    let expected = if teens {
        "th"
    } else {
        match head.as_bytes()[head.len() - 1] {
            b'1' => "st",
            b'2' => "nd",
            b'3' => "rd",
            _ => "th",
        }
    };
    suffix == expected
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

enum Step {
    Millis(f64),
    Days(f64),
    Months(f64),
}

/// `in <amount> <unit>`. Days and months are whole; weeks become days and
/// years become months before rounding.
fn resolve_in(parts: &[Option<&str>], from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let amount: f64 = parts.first().copied().flatten()?.parse().ok()?;
    let unit = parts.get(1).copied().flatten()?;

    let step = match unit {
        "M" => Step::Months(amount),
        _ => match unit.to_ascii_lowercase().as_str() {
            "ms" | "millisecond" | "milliseconds" => Step::Millis(amount),
            "s" | "sec" | "secs" | "second" | "seconds" => Step::Millis(amount * 1_000.0),
            "m" | "min" | "mins" | "minute" | "minutes" => Step::Millis(amount * 60_000.0),
            "h" | "hr" | "hrs" | "hour" | "hours" => Step::Millis(amount * 3_600_000.0),
            "d" | "day" | "days" => Step::Days(amount),
            "w" | "week" | "weeks" => Step::Days(amount * 7.0),
            "month" | "months" => Step::Months(amount),
            "q" | "quarter" | "quarters" => Step::Months(amount * 3.0),
            "y" | "yr" | "yrs" | "year" | "years" => Step::Months(amount * 12.0),
            _ => return None,
        },
    };

    match step {
        Step::Millis(ms) => {
            let ms = ms.round();
            if ms > i64::MAX as f64 {
                return None;
            }
            from.checked_add_signed(TimeDelta::try_milliseconds(ms as i64)?)
        }
        Step::Days(days) => from.checked_add_days(Days::new(u64::try_from(days.round() as i64).ok()?)),
        Step::Months(months) => {
            from.checked_add_months(Months::new(u32::try_from(months.round() as i64).ok()?))
        }
    }
}

fn month_number(name: &str) -> Option<u32> {
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
    let name = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|full| *full == name || (name.len() == 3 && full.starts_with(&name)))
        .map(|index| index as u32 + 1)
}

/// Next occurrence of a calendar day, this year or the one after.
fn next_calendar_day(
    day: &str,
    suffix: Option<&str>,
    month: &str,
    from: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if let Some(suffix) = suffix {
        if !is_valid_sequence_number(&format!("{day}{suffix}")) {
            return None;
        }
    }
    let month = month_number(month)?;
    let day: u32 = day.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(from.year(), month, day)?;

    if midnight(date) >= from {
        return Some(midnight(date));
    }
    date.with_year(from.year() + 1).map(midnight)
}

fn resolve_month_day(parts: &[Option<&str>], from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let [month, day, suffix] = parts else {
        return None;
    };
    next_calendar_day((*day)?, *suffix, (*month)?, from)
}

fn resolve_day_month(parts: &[Option<&str>], from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let [day, suffix, month] = parts else {
        return None;
    };
    next_calendar_day((*day)?, *suffix, (*month)?, from)
}

/// `D.M`, `D.M.YY` or `D.M.YYYY`; never in the past.
fn resolve_numeric_date(parts: &[Option<&str>], from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let [day, month, year] = parts else {
        return None;
    };
    let day: u32 = (*day)?.parse().ok()?;
    let month: u32 = (*month)?.parse().ok()?;
    let year = match year {
        None => from.year(),
        Some(y) if y.len() == 2 => {
            let short: i32 = y.parse().ok()?;
            short + if short > 68 { 1900 } else { 2000 }
        }
        Some(y) => y.parse().ok()?,
    };

    let at = midnight(NaiveDate::from_ymd_opt(year, month, day)?);
    (at >= from).then_some(at)
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    const DAYS: [(&str, Weekday); 7] = [
        ("monday", Weekday::Mon),
        ("tuesday", Weekday::Tue),
        ("wednesday", Weekday::Wed),
        ("thursday", Weekday::Thu),
        ("friday", Weekday::Fri),
        ("saturday", Weekday::Sat),
        ("sunday", Weekday::Sun),
    ];
    let name = name.to_ascii_lowercase();
    DAYS.iter()
        .find(|(full, _)| *full == name || (name.len() == 3 && full.starts_with(&name)))
        .map(|(_, day)| *day)
}

/// The next such weekday, strictly after the day of `from`.
fn resolve_weekday(parts: &[Option<&str>], from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let target = weekday_from_name(parts.first().copied().flatten()?)?;
    let today = from.weekday().num_days_from_monday();
    let ahead = match (target.num_days_from_monday() + 7 - today) % 7 {
        0 => 7,
        n => n,
    };
    from.date_naive()
        .checked_add_days(Days::new(u64::from(ahead)))
        .map(midnight)
}
