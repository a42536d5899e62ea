//! `date` and `time` tags over an injected clock.
//!
//! Format names come from a curated vocabulary; anything unknown runs
//! through a Java-style → strftime translator so `yyyy-MM-dd HH:mm` style
//! strings from ported rule files keep working. All rendering is UTC.

use chrono::{DateTime, Datelike, Utc};

use crate::ast::Element;

use super::EvalContext;

/// Injected wall clock; swapped for a fixed instant in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn render(el: &Element, ctx: &mut EvalContext) -> String {
    let now = ctx.clock.now();
    let format = el.attr("format").map(str::trim).unwrap_or("");
    match el.name.as_str() {
        "date" => render_date(now, format),
        "time" => render_time(now, format),
        _ => String::new(),
    }
}

/// `interval from=X [to=Y] [style=S]`: elapsed time between two stamps
/// (`to` defaults to now) in the unit named by `style` (default days).
/// Stamps parse as RFC 3339 or plain `YYYY-MM-DD`.
pub fn interval(el: &Element, ctx: &mut EvalContext) -> String {
    let Some(from) = el.attr("from").map(str::trim).and_then(parse_stamp) else {
        return String::new();
    };
    let to = el
        .attr("to")
        .map(str::trim)
        .and_then(parse_stamp)
        .unwrap_or_else(|| ctx.clock.now());
    let delta = to.signed_duration_since(from);

    match el.attr("style").map(str::trim).unwrap_or("days") {
        "years" => (delta.num_days() / 365).to_string(),
        "months" => (delta.num_days() / 30).to_string(),
        "" | "days" => delta.num_days().to_string(),
        "hours" => delta.num_hours().to_string(),
        "minutes" => delta.num_minutes().to_string(),
        "seconds" => delta.num_seconds().to_string(),
        _ => String::new(),
    }
}

fn parse_stamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn render_date(now: DateTime<Utc>, format: &str) -> String {
    match format {
        "" => now.format("%B %d, %Y").to_string(),
        "short" => now.format("%m/%d/%y").to_string(),
        "long" => now.format("%A, %B %d, %Y").to_string(),
        "iso" => now.format("%Y-%m-%d").to_string(),
        "us" => now.format("%m/%d/%Y").to_string(),
        "european" => now.format("%d.%m.%Y").to_string(),
        "day" => now.format("%d").to_string(),
        "month" => now.format("%B").to_string(),
        "year" => now.format("%Y").to_string(),
        "dayofyear" => now.ordinal().to_string(),
        "weekday" => now.format("%A").to_string(),
        "week" => now.iso_week().week().to_string(),
        "quarter" => ((now.month() - 1) / 3 + 1).to_string(),
        "leapyear" => is_leap_year(now.year()).to_string(),
        "daysinmonth" => days_in_month(now.year(), now.month()).to_string(),
        "daysinyear" => if is_leap_year(now.year()) { "366" } else { "365" }.to_string(),
        other => now.format(&java_to_strftime(other)).to_string(),
    }
}

fn render_time(now: DateTime<Utc>, format: &str) -> String {
    match format {
        "" => now.format("%H:%M:%S").to_string(),
        "12" => now.format("%I:%M %p").to_string(),
        "24" => now.format("%H:%M").to_string(),
        "iso" => now.format("%H:%M:%S").to_string(),
        "hour" => now.format("%H").to_string(),
        "minute" => now.format("%M").to_string(),
        "second" => now.format("%S").to_string(),
        "millisecond" => format!("{:03}", now.timestamp_subsec_millis()),
        "timezone" => "UTC".to_string(),
        "offset" => now.format("%:z").to_string(),
        "unix" => now.timestamp().to_string(),
        "unixmilli" => now.timestamp_millis().to_string(),
        "unixnano" => now.timestamp_nanos_opt().map(|n| n.to_string()).unwrap_or_default(),
        "rfc3339" => now.to_rfc3339(),
        "rfc822" => now.format("%a, %d %b %Y %H:%M:%S %z").to_string(),
        "kitchen" => now.format("%-I:%M%p").to_string(),
        "stamp" => now.format("%b %e %H:%M:%S").to_string(),
        "stampmilli" => now.format("%b %e %H:%M:%S%.3f").to_string(),
        "stampmicro" => now.format("%b %e %H:%M:%S%.6f").to_string(),
        "stampnano" => now.format("%b %e %H:%M:%S%.9f").to_string(),
        other => now.format(&java_to_strftime(other)).to_string(),
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
    }
}

/// Longest-token-first translation of Java `SimpleDateFormat` patterns to
/// strftime. Unrecognized characters pass through (with `%` escaped).
pub fn java_to_strftime(pattern: &str) -> String {
    const TOKENS: &[(&str, &str)] = &[
        ("yyyy", "%Y"),
        ("yy", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("M", "%-m"),
        ("dd", "%d"),
        ("d", "%-d"),
        ("EEEE", "%A"),
        ("EEE", "%a"),
        ("HH", "%H"),
        ("H", "%-H"),
        ("hh", "%I"),
        ("h", "%-I"),
        ("mm", "%M"),
        ("m", "%-M"),
        ("ss", "%S"),
        ("s", "%-S"),
        ("SSS", "%3f"),
        ("a", "%p"),
        ("zzz", "%Z"),
        ("Z", "%z"),
    ];

    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for (java, strf) in TOKENS {
            if let Some(tail) = rest.strip_prefix(java) {
                out.push_str(strf);
                rest = tail;
                continue 'outer;
            }
        }
        let c = rest.chars().next().expect("nonempty");
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}
