//! Tolerant timestamp parsing for survey export cells.
//!
//! Known layouts are tried first. Anything else goes through a token pass
//! that pulls a date out of surrounding text ("March 3rd, 2024 (survey)").

use std::sync::LazyLock;

use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

/// Four-digit numbers in free text only count as a year inside this range.
const PLAUSIBLE_YEARS: RangeInclusive<i32> = 1900..=2100;

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "{md}/%Y %H:%M:%S",
    "{md}/%Y %H:%M",
    "{md}/%Y %I:%M:%S %p",
    "{md}/%Y %I:%M %p",
];

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "{md}/%Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})\b").expect("valid ISO date pattern")
});

static SHORT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[-/.](\d{1,2})[-/.](\d{4}|\d{2})\b").expect("valid short date pattern")
});

static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\.\d+)?\s*([ap])?\.?m?\.?\b")
        .expect("valid clock pattern")
});

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)(st|nd|rd|th)?|([a-z]+)").expect("valid token pattern")
});

/// Parse a cell into a timestamp, or `None` if no date can be found in it.
///
/// `day_first` only matters for ambiguous numeric dates such as `03/04/2024`.
pub fn parse_timestamp(raw: &str, day_first: bool) -> Option<NaiveDateTime> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    parse_strict(text, day_first)
        .filter(|dt| has_full_year(dt.date()))
        .or_else(|| parse_fuzzy(text, day_first))
}

/// chrono's `%Y` also takes one- and two-digit years; those are left to
/// `expand_year` in the fuzzy pass.
fn has_full_year(date: NaiveDate) -> bool {
    date.year() >= 1000
}

fn parse_strict(text: &str, day_first: bool) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }

    let md = if day_first { "%d/%m" } else { "%m/%d" };

    for fmt in DATETIME_FORMATS.iter() {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, &fmt.replace("{md}", md)) {
            return Some(dt);
        }
    }

    for fmt in DATE_FORMATS.iter() {
        if let Ok(d) = NaiveDate::parse_from_str(text, &fmt.replace("{md}", md)) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }

    None
}

fn parse_fuzzy(text: &str, day_first: bool) -> Option<NaiveDateTime> {
    let (time, rest) = extract_clock(text);
    let date = numeric_date(&rest, day_first).or_else(|| token_date(&rest, day_first))?;
    Some(date.and_time(time.unwrap_or(NaiveTime::MIN)))
}

/// Pull the first clock reading out of `text`, returning the text without it.
fn extract_clock(text: &str) -> (Option<NaiveTime>, String) {
    let Some(caps) = CLOCK.captures(text) else {
        return (None, text.to_string());
    };

    let mut hour: u32 = caps[1].parse().unwrap_or(99);
    let minute: u32 = caps[2].parse().unwrap_or(99);
    let second: u32 = caps.get(3).map_or(Some(0), |s| s.as_str().parse().ok()).unwrap_or(99);

    match caps.get(4).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        Some("p") if hour < 12 => hour += 12,
        Some("a") if hour == 12 => hour = 0,
        _ => {}
    }

    let whole = caps.get(0).map_or(0..0, |m| m.range());
    let mut rest = text.to_string();
    rest.replace_range(whole, " ");
    (NaiveTime::from_hms_opt(hour, minute, second), rest)
}

fn numeric_date(text: &str, day_first: bool) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DATE.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
        if date.is_some_and(has_full_year) {
            return date;
        }
    }

    let caps = SHORT_DATE.captures(text)?;
    let first: u32 = caps[1].parse().ok()?;
    let second: u32 = caps[2].parse().ok()?;
    let year = expand_year(&caps[3])?;
    let (month, day) = if day_first { (second, first) } else { (first, second) };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn token_date(text: &str, day_first: bool) -> Option<NaiveDate> {
    let mut month: Option<u32> = None;
    let mut month_at: Option<usize> = None;
    let mut day: Option<u32> = None;
    let mut years: Vec<(usize, i32)> = Vec::new();
    let mut smalls: Vec<u32> = Vec::new();

    for (idx, caps) in TOKEN.captures_iter(text).enumerate() {
        if let Some(word) = caps.get(3) {
            if month.is_none() {
                month = month_from_name(word.as_str());
                month_at = month.map(|_| idx);
            }
            continue;
        }

        let digits = &caps[1];
        let Ok(value) = digits.parse::<u32>() else {
            continue;
        };

        if caps.get(2).is_some() {
            if day.is_none() && (1..=31).contains(&value) {
                day = Some(value);
            }
        } else if digits.len() == 4 {
            let year = i32::try_from(value).ok();
            if let Some(year) = year.filter(|y| PLAUSIBLE_YEARS.contains(y)) {
                years.push((idx, year));
            }
        } else if value <= 31 {
            smalls.push(value);
        }
    }

    // work-order and ticket numbers tend to come before the date
    let mut year = match month_at {
        Some(at) => years
            .iter()
            .find(|(idx, _)| *idx > at)
            .or_else(|| years.last())
            .map(|&(_, y)| y),
        None => years.last().map(|&(_, y)| y),
    };

    let mut smalls = smalls.into_iter();
    if month.is_none() {
        if day_first {
            if day.is_none() {
                day = smalls.next();
            }
            month = smalls.next();
        } else {
            month = smalls.next();
            if day.is_none() {
                day = smalls.next();
            }
        }
    } else if day.is_none() {
        day = smalls.next();
    }

    if year.is_none() {
        year = smalls.next().and_then(|yy| expand_year(&format!("{yy:02}")));
    }

    NaiveDate::from_ymd_opt(year?, month?, day.unwrap_or(1))
}

fn expand_year(digits: &str) -> Option<i32> {
    let value: i32 = digits.parse().ok()?;
    match digits.len() {
        4 => Some(value),
        2 => Some(2000 + value),
        _ => None,
    }
}

fn month_from_name(word: &str) -> Option<u32> {
    const NAMES: [&str; 12] = [
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

    let word = word.to_ascii_lowercase();
    if word == "sept" {
        return Some(9);
    }
    NAMES
        .iter()
        .position(|name| *name == word || (word.len() == 3 && name.starts_with(&word)))
        .map(|idx| idx as u32 + 1)
}
