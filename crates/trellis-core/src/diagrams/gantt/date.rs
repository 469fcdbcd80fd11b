//! Day.js style `dateFormat` strings mapped onto chrono, plus task durations and excluded days.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc, Weekday};

/// Day.js tokens, longest first within each letter.
const TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%m"),
    ("DD", "%d"),
    ("D", "%d"),
    ("HH", "%H"),
    ("H", "%H"),
    ("hh", "%I"),
    ("h", "%I"),
    ("mm", "%M"),
    ("m", "%M"),
    ("ss", "%S"),
    ("s", "%S"),
    ("SSS", "%3f"),
    ("A", "%p"),
    ("a", "%p"),
];

/// Translates a Day.js format into a chrono one.
///
/// Returns `None` when the format uses a token chrono cannot read back.
pub fn to_chrono_format(format: &str) -> Option<String> {
    let mut out = String::with_capacity(format.len() * 2);
    let mut rest = format;
    while let Some(c) = rest.chars().next() {
        if c == '[' {
            let end = rest.find(']')?;
            out.push_str(&rest[1..end].replace('%', "%%"));
            rest = &rest[end + 1..];
            continue;
        }
        if c.is_ascii_alphabetic() {
            let (token, chrono) = TOKENS.iter().find(|(token, _)| rest.starts_with(token))?;
            out.push_str(chrono);
            rest = &rest[token.len()..];
            continue;
        }
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    Some(out)
}

/// Parses `text` with a Day.js `format`. Date-only formats resolve to midnight.
///
/// `x` and `X` read Unix timestamps in milliseconds and seconds.
pub fn parse_date(format: &str, text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    match format.trim() {
        "x" => {
            return text
                .parse::<i64>()
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(|dt| dt.naive_utc());
        }
        "X" => {
            return text
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                .map(|dt| dt.naive_utc());
        }
        _ => {}
    }
    let chrono = to_chrono_format(format.trim())?;
    NaiveDateTime::parse_from_str(text, &chrono)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, &chrono)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// `true` when `format` can be handed to [`parse_date`].
pub fn is_supported(format: &str) -> bool {
    matches!(format.trim(), "x" | "X") || to_chrono_format(format.trim()).is_some()
}

/// Parses `3d`, `1.5h`, `250ms`, `2w` and the like.
pub fn parse_duration(text: &str) -> Option<TimeDelta> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter(|&at| at > 0)?;
    let value: f64 = text[..split].parse().ok()?;
    let unit_ms = match &text[split..] {
        "ms" => 1.0,
        "s" => 1_000.0,
        "m" => 60_000.0,
        "h" => 3_600_000.0,
        "d" => 86_400_000.0,
        "w" => 604_800_000.0,
        _ => return None,
    };
    let millis = (value * unit_ms).round();
    if !millis.is_finite() {
        return None;
    }
    TimeDelta::try_milliseconds(millis as i64)
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Longest span, in days, that [`Calendar::stretch`] walks.
pub const MAX_STRETCH_DAYS: u32 = 36_600;

/// Days a task does not progress on, from the `excludes` and `includes` settings.
pub struct Calendar<'m> {
    pub excludes: &'m [String],
    pub includes: &'m [String],
    pub date_format: &'m str,
}

impl Calendar<'_> {
    fn matches(entries: &[String], day: NaiveDate, formatted: Option<&str>) -> bool {
        let iso = day.format("%Y-%m-%d").to_string();
        entries
            .iter()
            .any(|e| *e == iso || Some(e.as_str()) == formatted)
    }

    pub fn is_excluded(&self, day: NaiveDate) -> bool {
        let formatted = to_chrono_format(self.date_format)
            .map(|f| day.and_time(NaiveTime::MIN).format(&f).to_string());
        if Self::matches(self.includes, day, formatted.as_deref()) {
            return false;
        }
        let name = weekday_name(day.weekday());
        self.excludes.iter().any(|e| {
            (e == "weekends" && matches!(day.weekday(), Weekday::Sat | Weekday::Sun)) || e == name
        }) || Self::matches(self.excludes, day, formatted.as_deref())
    }

    /// Pushes `end` back by one day for every excluded day after `start` up to `end`.
    ///
    /// `None` when the walk passes [`MAX_STRETCH_DAYS`] or the end leaves chrono's range.
    pub fn stretch(&self, start: NaiveDateTime, mut end: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.excludes.is_empty() {
            return Some(end);
        }
        let mut day = start.date().succ_opt();
        let mut walked = 0u32;
        while let Some(current) = day.filter(|d| *d <= end.date()) {
            walked += 1;
            if walked > MAX_STRETCH_DAYS {
                return None;
            }
            if self.is_excluded(current) {
                end = end.checked_add_signed(TimeDelta::days(1))?;
            }
            day = current.succ_opt();
        }
        Some(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date")
    }

    #[test]
    fn dayjs_formats_translate() {
        assert_eq!(to_chrono_format("YYYY-MM-DD").as_deref(), Some("%Y-%m-%d"));
        assert_eq!(
            to_chrono_format("YYYY-MM-DD HH:mm").as_deref(),
            Some("%Y-%m-%d %H:%M")
        );
        assert_eq!(to_chrono_format("[Week] W"), None);
    }

    #[test]
    fn dates_parse_with_and_without_time() {
        assert_eq!(parse_date("YYYY-MM-DD", "2024-01-15"), Some(at(2024, 1, 15)));
        assert_eq!(
            parse_date("DD/MM/YYYY HH:mm", "15/01/2024 09:30"),
            at(2024, 1, 15).checked_add_signed(TimeDelta::minutes(570))
        );
        assert_eq!(parse_date("YYYY-MM-DD", "not a date"), None);
        assert_eq!(parse_date("X", "86400"), Some(at(1970, 1, 2)));
    }

    #[test]
    fn durations_cover_every_unit() {
        assert_eq!(parse_duration("3d"), Some(TimeDelta::days(3)));
        assert_eq!(parse_duration("1.5h"), Some(TimeDelta::minutes(90)));
        assert_eq!(parse_duration("250ms"), Some(TimeDelta::milliseconds(250)));
        assert_eq!(parse_duration("2w"), Some(TimeDelta::days(14)));
        assert_eq!(parse_duration("5y"), None);
        assert_eq!(parse_duration("d"), None);
    }

    #[test]
    fn weekends_stretch_task_ends() {
        let excludes = vec!["weekends".to_string()];
        let calendar = Calendar {
            excludes: &excludes,
            includes: &[],
            date_format: "YYYY-MM-DD",
        };
        // 2024-01-05 is a Friday; three days of work end on Wednesday.
        let end = calendar.stretch(at(2024, 1, 5), at(2024, 1, 8));
        assert_eq!(end, Some(at(2024, 1, 10)));
    }

    #[test]
    fn stretch_gives_up_when_no_day_is_workable() {
        let excludes: Vec<String> = ["weekends", "monday", "tuesday", "wednesday", "thursday", "friday"]
            .iter()
            .map(|d| d.to_string())
            .collect();
        let calendar = Calendar {
            excludes: &excludes,
            includes: &[],
            date_format: "YYYY-MM-DD",
        };
        assert_eq!(calendar.stretch(at(2024, 1, 1), at(2024, 1, 2)), None);
    }
}
