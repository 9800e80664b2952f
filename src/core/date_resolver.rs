use chrono::{
    DateTime, Days, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use regex::Regex;

const MONTH_PATTERN: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

const PREFIXES: &[&str] = &["deal ends on", "expires on", "ends on", "ends at", "expires at"];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%B %d %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d %B, %Y",
];

/// Turns the expiry text shown on deal pages into an absolute instant.
pub struct DateResolver {
    relative: Regex,
    month_day_year: Regex,
    day_month_year: Regex,
    trailing_time: Regex,
}

impl DateResolver {
    pub fn new() -> Self {
        Self {
            relative: Regex::new(r"(?i)\b(\d+)\s*(days?|hours?|hrs?)\b").expect("relative pattern"),
            month_day_year: Regex::new(&format!(
                r"(?i)\b{}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b",
                MONTH_PATTERN
            ))
            .expect("month-day-year pattern"),
            day_month_year: Regex::new(&format!(
                r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{}\.?,?\s+(\d{{4}})\b",
                MONTH_PATTERN
            ))
            .expect("day-month-year pattern"),
            trailing_time: Regex::new(
                r"(?i)[\s,]+(?:at\s+)?(?:\d{1,2}:\d{2}(?::\d{2})?\s*(?:am|pm)?|\d{1,2}\s*(?:am|pm))(?:\s*(?:utc[+-]\d{1,2}|[+-]\d{2}:?\d{2}|[a-z]{1,5}))?\.?\s*$",
            )
            .expect("trailing time pattern"),
        }
    }

    pub fn resolve(&self, text: &str) -> Option<DateTime<Utc>> {
        self.resolve_at(text, Local::now())
    }

    /// Same as [`resolve`](Self::resolve) against a fixed clock.
    pub fn resolve_at(&self, text: &str, now: DateTime<Local>) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let lowered = text.to_lowercase();

        if lowered.contains("tonight") {
            return end_of_local_day(now.date_naive());
        }

        if lowered.contains("tomorrow") {
            return end_of_local_day(now.date_naive().checked_add_days(Days::new(1))?);
        }

        if let Some(caps) = self.relative.captures(&lowered) {
            let amount: u32 = caps[1].parse().ok()?;
            return if caps[2].starts_with('d') {
                let date = now.date_naive().checked_add_days(Days::new(u64::from(amount)))?;
                end_of_local_day(date)
            } else {
                let hours = Duration::try_hours(i64::from(amount))?;
                now.with_timezone(&Utc).checked_add_signed(hours)
            };
        }

        if let Some(caps) = self.month_day_year.captures(&lowered) {
            return midnight_utc(&caps[3], &caps[1], &caps[2]);
        }

        if let Some(caps) = self.day_month_year.captures(&lowered) {
            return midnight_utc(&caps[3], &caps[2], &caps[1]);
        }

        self.resolve_general(text)
    }

    fn resolve_general(&self, text: &str) -> Option<DateTime<Utc>> {
        let mut remainder = text;
        for prefix in PREFIXES {
            if remainder
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
            {
                remainder = remainder[prefix.len()..].trim_start_matches([':', ' ']);
                break;
            }
        }
        let remainder = remainder.trim();

        if let Some(instant) = parse_timestamp(remainder) {
            return Some(instant);
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(remainder) {
            return Some(dt.with_timezone(&Utc));
        }

        let date_part = self.trailing_time.replace(remainder, "");
        let date_part = date_part.trim().trim_end_matches([',', '.']);
        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

impl Default for DateResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads an expiry value as stored on a deal record. Naive values are taken as UTC.
pub fn parse_timestamp(stored: &str) -> Option<DateTime<Utc>> {
    let stored = stored.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(stored) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(stored, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(stored, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Canonical stored form: RFC 3339 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn end_of_local_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    let naive = date.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn midnight_utc(year: &str, month: &str, day: &str) -> Option<DateTime<Utc>> {
    let year: i32 = year.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    let month = month_number(month)?;
    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

fn month_number(name: &str) -> Option<u32> {
    let key = name.get(..3)?.to_ascii_lowercase();
    let month = match key.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
