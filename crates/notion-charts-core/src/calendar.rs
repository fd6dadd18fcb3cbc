//! GitHub-style contribution calendar grid
//!
//! The grid is a list of week columns, each holding exactly seven day cells
//! from Sunday to Saturday. Two window strategies exist: the calendar year
//! containing `today`, or the trailing 52 weeks ending with `today`.

use crate::ContributionEntry;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalendarMode {
    /// Jan 1 through Dec 31 of the current year, padded to whole weeks
    #[default]
    CalendarYear,
    /// The last 52 weeks plus the current partial week
    Trailing52,
}

impl CalendarMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "year" | "calendaryear" | "calendar-year" => Some(CalendarMode::CalendarYear),
            "trailing52" | "trailing" | "52w" | "last-year" => Some(CalendarMode::Trailing52),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarMode::CalendarYear => "year",
            CalendarMode::Trailing52 => "trailing52",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CalendarOptions {
    pub mode: CalendarMode,
    /// Reference date, already resolved in the caller's timezone
    pub today: NaiveDate,
}

/// Cell shade bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Empty,
    Level1,
    Level2,
    Level3,
    Level4,
}

impl Intensity {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => Intensity::Empty,
            1 => Intensity::Level1,
            2 => Intensity::Level2,
            3 => Intensity::Level3,
            _ => Intensity::Level4,
        }
    }

    pub fn level(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub count: usize,
    pub intensity: Intensity,
    /// False for cells that only pad the grid to whole weeks
    pub in_range: bool,
    pub is_today: bool,
    /// First entry for the date; the count still covers all of them
    pub detail: Option<ContributionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthLabel {
    pub label: String,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionCalendar {
    pub mode: CalendarMode,
    pub weeks: Vec<Vec<CalendarCell>>,
    pub month_labels: Vec<MonthLabel>,
    pub total_contributions: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Target year in calendar-year mode
    pub year: Option<i32>,
}

fn days_since_sunday(date: NaiveDate) -> i64 {
    date.weekday().num_days_from_sunday() as i64
}

/// Build the week grid for `entries`
pub fn build_calendar(entries: &[ContributionEntry], options: &CalendarOptions) -> ContributionCalendar {
    let today = options.today;

    let mut by_date: HashMap<&str, (usize, &ContributionEntry)> = HashMap::new();
    for entry in entries {
        by_date
            .entry(entry.date.as_str())
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, entry));
    }

    let (start, end, year) = match options.mode {
        CalendarMode::CalendarYear => {
            let year = today.year();
            let jan1 = today - Duration::days(today.ordinal0() as i64);
            let dec31 = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(jan1 + Duration::days(364));
            (
                jan1 - Duration::days(days_since_sunday(jan1)),
                dec31 + Duration::days(6 - days_since_sunday(dec31)),
                Some(year),
            )
        }
        CalendarMode::Trailing52 => (
            today - Duration::days(days_since_sunday(today) + 52 * 7),
            today + Duration::days(6 - days_since_sunday(today)),
            None,
        ),
    };

    let today_key = today.format("%Y-%m-%d").to_string();
    let mut weeks: Vec<Vec<CalendarCell>> = Vec::new();
    let mut month_labels = Vec::new();
    let mut last_month: Option<u32> = None;

    for day in start.iter_days().take_while(|d| *d <= end) {
        if weeks.last().map_or(true, |w| w.len() == 7) {
            weeks.push(Vec::with_capacity(7));
        }
        let col = weeks.len() - 1;

        let key = day.format("%Y-%m-%d").to_string();
        let in_range = match year {
            Some(y) => day.year() == y,
            None => day <= today,
        };
        let (count, detail) = by_date
            .get(key.as_str())
            .map(|(count, first)| (*count, Some((*first).clone())))
            .unwrap_or((0, None));

        if in_range && last_month != Some(day.month()) {
            month_labels.push(MonthLabel {
                label: MONTH_LABELS[day.month0() as usize].to_string(),
                col,
            });
            last_month = Some(day.month());
        }

        weeks[col].push(CalendarCell {
            date: day,
            count,
            intensity: if in_range {
                Intensity::from_count(count)
            } else {
                Intensity::Empty
            },
            in_range,
            is_today: key == today_key,
            detail,
        });
    }

    let total_contributions = match year {
        Some(y) => entries
            .iter()
            .filter(|e| {
                NaiveDate::parse_from_str(&e.date, "%Y-%m-%d").is_ok_and(|d| d.year() == y)
            })
            .count(),
        None => entries.len(),
    };

    ContributionCalendar {
        mode: options.mode,
        weeks,
        month_labels,
        total_contributions,
        start,
        end,
        year,
    }
}

impl ContributionCalendar {
    /// Cell for a given date, if it is on the grid
    pub fn cell(&self, date: NaiveDate) -> Option<&CalendarCell> {
        let offset = (date - self.start).num_days();
        if offset < 0 {
            return None;
        }
        let offset = offset as usize;
        self.weeks.get(offset / 7).and_then(|w| w.get(offset % 7))
    }

    pub fn cells(&self) -> impl Iterator<Item = &CalendarCell> {
        self.weeks.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(date: &str, subject: &str) -> ContributionEntry {
        ContributionEntry {
            date: date.to_string(),
            subject: subject.to_string(),
            description: String::new(),
        }
    }

    fn opts(mode: CalendarMode, today: NaiveDate) -> CalendarOptions {
        CalendarOptions { mode, today }
    }

    #[test]
    fn test_grid_shape_both_modes() {
        for today in [date(2024, 7, 4), date(2023, 1, 1), date(2025, 12, 31), date(2026, 3, 14)] {
            for mode in [CalendarMode::CalendarYear, CalendarMode::Trailing52] {
                let cal = build_calendar(&[], &opts(mode, today));
                assert!(cal.weeks.len() >= 53);
                assert!(cal.weeks.iter().all(|w| w.len() == 7));
                assert_eq!(cal.weeks[0][0].date.weekday(), Weekday::Sun);
                assert_eq!(cal.weeks.last().unwrap()[6].date.weekday(), Weekday::Sat);
            }
        }
    }

    #[test]
    fn test_single_entry_year() {
        let cal = build_calendar(
            &[entry("2024-07-04", "Launch")],
            &opts(CalendarMode::CalendarYear, date(2024, 10, 1)),
        );

        assert_eq!(cal.year, Some(2024));
        assert_eq!(cal.start, date(2023, 12, 31));
        assert_eq!(cal.end, date(2025, 1, 4));
        assert_eq!(cal.weeks.len(), 53);

        let cell = cal.cell(date(2024, 7, 4)).unwrap();
        assert_eq!(cell.intensity, Intensity::Level1);
        assert_eq!(cell.detail.as_ref().unwrap().subject, "Launch");

        let others = cal
            .cells()
            .filter(|c| c.in_range && c.date != date(2024, 7, 4))
            .filter(|c| c.intensity != Intensity::Empty)
            .count();
        assert_eq!(others, 0);
        assert_eq!(cal.cells().filter(|c| c.in_range).count(), 366);
        assert_eq!(cal.total_contributions, 1);
    }

    #[test]
    fn test_padding_cells_are_blank() {
        let cal = build_calendar(
            &[entry("2023-12-31", "old"), entry("2024-01-01", "new")],
            &opts(CalendarMode::CalendarYear, date(2024, 1, 1)),
        );

        let pad = &cal.weeks[0][0];
        assert_eq!(pad.date, date(2023, 12, 31));
        assert!(!pad.in_range);
        assert_eq!(pad.intensity, Intensity::Empty);
        assert_eq!(cal.total_contributions, 1);
        assert!(cal.weeks[0][1].is_today);
    }

    #[test]
    fn test_count_governs_intensity_first_entry_wins() {
        let entries: Vec<_> = ["first", "second", "third", "fourth", "fifth"]
            .iter()
            .map(|s| entry("2024-03-10", s))
            .collect();
        let cal = build_calendar(&entries, &opts(CalendarMode::CalendarYear, date(2024, 6, 1)));

        let cell = cal.cell(date(2024, 3, 10)).unwrap();
        assert_eq!(cell.count, 5);
        assert_eq!(cell.intensity, Intensity::Level4);
        assert_eq!(cell.detail.as_ref().unwrap().subject, "first");
    }

    #[test]
    fn test_intensity_buckets() {
        assert_eq!(Intensity::from_count(0), Intensity::Empty);
        assert_eq!(Intensity::from_count(3), Intensity::Level3);
        assert_eq!(Intensity::from_count(40), Intensity::Level4);
        assert_eq!(Intensity::Level2.level(), 2);
    }

    #[test]
    fn test_month_labels_year() {
        let cal = build_calendar(&[], &opts(CalendarMode::CalendarYear, date(2024, 5, 5)));
        assert_eq!(cal.month_labels.len(), 12);
        assert_eq!(cal.month_labels[0], MonthLabel { label: "Jan".into(), col: 0 });
        assert_eq!(cal.month_labels[1], MonthLabel { label: "Feb".into(), col: 4 });
        assert_eq!(cal.month_labels[11].label, "Dec");
    }

    #[test]
    fn test_trailing_window() {
        let today = date(2024, 7, 4);
        let entries = vec![entry("2020-01-01", "ancient"), entry("2024-07-04", "now")];
        let cal = build_calendar(&entries, &opts(CalendarMode::Trailing52, today));

        assert_eq!(cal.year, None);
        assert_eq!(cal.weeks.len(), 53);
        assert_eq!(cal.start, date(2023, 7, 2));
        assert_eq!(cal.total_contributions, 2);

        let cell = cal.cell(today).unwrap();
        assert!(cell.is_today);
        assert!(cell.in_range);
        assert_eq!(cell.intensity, Intensity::Level1);

        let future = cal.cell(date(2024, 7, 5)).unwrap();
        assert!(!future.in_range);
        assert_eq!(cal.month_labels[0].label, "Jul");
        assert_eq!(cal.month_labels.last().unwrap().label, "Jul");
        assert_eq!(cal.month_labels.len(), 13);
    }

    #[test]
    fn test_cell_lookup_out_of_grid() {
        let cal = build_calendar(&[], &opts(CalendarMode::CalendarYear, date(2024, 5, 5)));
        assert!(cal.cell(date(2022, 1, 1)).is_none());
        assert!(cal.cell(date(2026, 1, 1)).is_none());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(CalendarMode::parse("trailing52"), Some(CalendarMode::Trailing52));
        assert_eq!(CalendarMode::parse("year"), Some(CalendarMode::CalendarYear));
        assert_eq!(CalendarMode::parse("decade"), None);
    }
}
