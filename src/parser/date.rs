use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

/// Month lookup, full genitive form first, then the three-letter abbreviation.
/// Abbreviations are matched as substrings of the captured word, so "дек"
/// also covers "декабря" when the full form is missing from a variant.
const MONTHS: &[(&str, u32)] = &[
    ("января", 1),
    ("янв", 1),
    ("февраля", 2),
    ("фев", 2),
    ("марта", 3),
    ("мар", 3),
    ("апреля", 4),
    ("апр", 4),
    ("мая", 5),
    ("май", 5),
    ("июня", 6),
    ("июн", 6),
    ("июля", 7),
    ("июл", 7),
    ("августа", 8),
    ("авг", 8),
    ("сентября", 9),
    ("сен", 9),
    ("октября", 10),
    ("окт", 10),
    ("ноября", 11),
    ("ноя", 11),
    ("декабря", 12),
    ("дек", 12),
];

fn day_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})\s+(\w+)").unwrap())
}

/// Parse a posting date like "3 декабря" relative to `today`.
///
/// The card carries no year. A nominally-future parse means the posting is
/// from last year (the site never shows future dates), so it is shifted back
/// one year. Any unparsable or calendar-invalid input resolves to `today` —
/// this function never fails.
pub fn parse_posted_date(text: Option<&str>, today: NaiveDate) -> NaiveDate {
    let Some(text) = text else {
        return today;
    };
    let text = text.trim().to_lowercase();

    let Some(caps) = day_month_re().captures(&text) else {
        return today;
    };
    let Ok(day) = caps[1].parse::<u32>() else {
        return today;
    };
    let word = &caps[2];

    let Some(month) = MONTHS
        .iter()
        .find(|(name, _)| word.contains(name))
        .map(|&(_, m)| m)
    else {
        return today;
    };

    use chrono::Datelike;
    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(date) if date > today => {
            // Same day last year; Feb 29 can disappear across the shift.
            NaiveDate::from_ymd_opt(today.year() - 1, month, day).unwrap_or(today)
        }
        Some(date) => date,
        None => today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn same_year_past_date() {
        let today = d(2025, 12, 10);
        assert_eq!(parse_posted_date(Some("3 декабря"), today), d(2025, 12, 3));
    }

    #[test]
    fn future_date_rolls_back_a_year() {
        let today = d(2025, 3, 1);
        assert_eq!(parse_posted_date(Some("3 декабря"), today), d(2024, 12, 3));
        // Future within the same month too.
        assert_eq!(parse_posted_date(Some("15 марта"), today), d(2024, 3, 15));
    }

    #[test]
    fn today_is_not_future() {
        let today = d(2025, 12, 3);
        assert_eq!(parse_posted_date(Some("3 декабря"), today), today);
    }

    #[test]
    fn abbreviated_month() {
        let today = d(2025, 12, 10);
        assert_eq!(parse_posted_date(Some("5 дек"), today), d(2025, 12, 5));
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        let today = d(2025, 12, 10);
        assert_eq!(
            parse_posted_date(Some("  3 Декабря  "), today),
            d(2025, 12, 3)
        );
    }

    #[test]
    fn invalid_day_falls_back_to_today() {
        let today = d(2025, 12, 10);
        assert_eq!(parse_posted_date(Some("32 декабря"), today), today);
        assert_eq!(parse_posted_date(Some("30 февраля"), today), today);
    }

    #[test]
    fn unknown_month_falls_back_to_today() {
        let today = d(2025, 12, 10);
        assert_eq!(parse_posted_date(Some("3 брюмера"), today), today);
    }

    #[test]
    fn none_and_garbage_fall_back_to_today() {
        let today = d(2025, 12, 10);
        assert_eq!(parse_posted_date(None, today), today);
        assert_eq!(parse_posted_date(Some("вчера"), today), today);
        assert_eq!(parse_posted_date(Some(""), today), today);
    }
}
