use chrono::{Datelike, NaiveDate};
use std::{collections::BTreeMap, path::PathBuf};
use thiserror::Error;

pub type Year = i32;
/// Position on the shared 366-day axis, see `day_slot`.
pub type DaySlot = u32;

/// Slot of Feb 29, which non-leap years simply don't have.
pub const LEAP_DAY: DaySlot = 60;
pub const DAYS_ON_AXIS: DaySlot = 366;

/// One line of the export file, exactly as read. The distance is kept as text
/// so that the normalizer decides what a valid number is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ActivityRecord {
    pub line: u64,
    pub date: String,
    pub distance: String,
    pub activity_type: String,
}

/// An activity that survived parsing and filtering; `distance` is already in
/// the output unit and never negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NormalizedActivity {
    pub year: Year,
    pub day: DaySlot,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SeriesPoint {
    pub day: DaySlot,
    /// Sum of the activities of that day alone.
    pub distance: f64,
    pub cumulative: f64,
}

/// Cumulative distance of one year. Points are strictly ordered by day and
/// there is at most one point per day, so `cumulative` never decreases.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct YearSeries {
    pub year: Year,
    pub activities: usize,
    pub points: Vec<SeriesPoint>,
}

impl YearSeries {
    pub fn total(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.cumulative)
    }

    pub fn pairs(&self) -> Vec<(DaySlot, f64)> {
        self.points.iter().map(|p| (p.day, p.cumulative)).collect()
    }

    /// One value per calendar day from Jan 1 through Dec 31, days without
    /// activity carrying the previous total. This is what gets plotted.
    pub fn daily_totals(&self) -> Vec<(DaySlot, f64)> {
        if self.points.is_empty() {
            return Vec::new();
        }
        let leap = is_leap_year(self.year);
        let mut points = self.points.iter().peekable();
        let mut total = 0.0;
        let mut daily = Vec::with_capacity(DAYS_ON_AXIS as usize);
        for day in 1..=DAYS_ON_AXIS {
            if day == LEAP_DAY && !leap {
                continue;
            }
            if let Some(point) = points.next_if(|p| p.day == day) {
                total = point.cumulative;
            }
            daily.push((day, total));
        }
        daily
    }
}

pub(crate) type YearMap = BTreeMap<Year, YearSeries>;

/// Distance units, both for the export column and for the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unit {
    Meters,
    Kilometers,
    Miles,
}

impl Unit {
    pub fn meters(self) -> f64 {
        match self {
            Unit::Meters => 1.0,
            Unit::Kilometers => 1000.0,
            Unit::Miles => 1609.344,
        }
    }

    pub fn convert(self, value: f64, to: Unit) -> f64 {
        if self == to {
            value
        } else {
            value * self.meters() / to.meters()
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Unit::Meters => "m",
            Unit::Kilometers => "km",
            Unit::Miles => "mi",
        }
    }
}

pub(crate) fn is_leap_year(year: Year) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Maps a date on the 366-slot axis shared by every year: non-leap years skip
/// slot 60, so March 1st is always slot 61 and years line up on the chart.
pub(crate) fn day_slot(date: NaiveDate) -> DaySlot {
    let ordinal = date.ordinal();
    if date.month() > 2 && !is_leap_year(date.year()) {
        ordinal + 1
    } else {
        ordinal
    }
}

/// Inverse of `day_slot`.
pub(crate) fn slot_date(year: Year, slot: DaySlot) -> Option<NaiveDate> {
    if slot == 0 || slot > DAYS_ON_AXIS {
        return None;
    }
    if is_leap_year(year) || slot < LEAP_DAY {
        NaiveDate::from_yo_opt(year, slot)
    } else if slot == LEAP_DAY {
        None
    } else {
        NaiveDate::from_yo_opt(year, slot - 1)
    }
}

/// Why a row didn't make it into the totals. Only some of these are actual
/// data problems, see `is_malformed`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("Unrecognized date {0:?}")]
    BadDate(String),
    #[error("Unparseable distance {0:?}")]
    BadDistance(String),
    #[error("Negative distance {0}")]
    NegativeDistance(f64),
    #[error("Activity type {0:?} filtered out")]
    OtherType(String),
    #[error("Year {0} filtered out")]
    OtherYear(Year),
}

impl RowError {
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            RowError::BadDate(_) | RowError::BadDistance(_) | RowError::NegativeDistance(_)
        )
    }
}

/// Errors that stop the run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input file {} not found", path.display())]
    InputNotFound { path: PathBuf },
    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Column {0:?} not found in the CSV header")]
    MissingColumn(String),
    #[error("No activity left to plot")]
    EmptyResult,
    #[error("Cannot render chart to {}: {message}", path.display())]
    Render { path: PathBuf, message: String },
    #[error("Cannot open a viewer for {}: {message}", path.display())]
    Viewer { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_slots_align_across_leap_years() {
        assert_eq!(day_slot(date(2023, 1, 1)), 1);
        assert_eq!(day_slot(date(2023, 2, 1)), 32);
        assert_eq!(day_slot(date(2023, 2, 28)), 59);
        assert_eq!(day_slot(date(2024, 2, 29)), LEAP_DAY);
        assert_eq!(day_slot(date(2023, 3, 1)), 61);
        assert_eq!(day_slot(date(2024, 3, 1)), 61);
        assert_eq!(day_slot(date(2023, 12, 31)), DAYS_ON_AXIS);
        assert_eq!(day_slot(date(2024, 12, 31)), DAYS_ON_AXIS);
    }

    #[test]
    fn test_slot_date() {
        assert_eq!(slot_date(2023, 61), Some(date(2023, 3, 1)));
        assert_eq!(slot_date(2024, 60), Some(date(2024, 2, 29)));
        assert_eq!(slot_date(2023, 60), None);
        assert_eq!(slot_date(2023, 0), None);
        assert_eq!(slot_date(2023, 367), None);
        for slot in 1..=DAYS_ON_AXIS {
            if let Some(d) = slot_date(2023, slot) {
                assert_eq!(day_slot(d), slot);
            }
        }
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(Unit::Miles.convert(5.0, Unit::Miles), 5.0);
        assert!((Unit::Kilometers.convert(10.0, Unit::Miles) - 6.21371).abs() < 1e-4);
        assert!((Unit::Meters.convert(1609.344, Unit::Miles) - 1.0).abs() < 1e-12);
        assert!((Unit::Miles.convert(1.0, Unit::Kilometers) - 1.609344).abs() < 1e-12);
    }

    #[test]
    fn test_daily_totals() {
        let series = YearSeries {
            year: 2023,
            activities: 2,
            points: vec![
                SeriesPoint {
                    day: 2,
                    distance: 3.0,
                    cumulative: 3.0,
                },
                SeriesPoint {
                    day: 62,
                    distance: 1.0,
                    cumulative: 4.0,
                },
            ],
        };
        let daily = series.daily_totals();
        // every day of 2023, no Feb 29
        assert_eq!(daily.len(), 365);
        assert_eq!(daily[0], (1, 0.0));
        assert_eq!(daily[1], (2, 3.0));
        assert!(!daily.iter().any(|&(day, _)| day == LEAP_DAY));
        assert_eq!(daily[60], (62, 4.0));
        assert_eq!(daily.last(), Some(&(DAYS_ON_AXIS, 4.0)));
        assert_eq!(series.total(), 4.0);
    }

    #[test]
    fn test_daily_totals_run_to_year_end() {
        let series = YearSeries {
            year: 2024,
            activities: 1,
            points: vec![SeriesPoint {
                day: 100,
                distance: 5.0,
                cumulative: 5.0,
            }],
        };
        let daily = series.daily_totals();
        assert_eq!(daily.len(), 366);
        assert_eq!(daily[LEAP_DAY as usize - 1], (LEAP_DAY, 0.0));
        assert_eq!(daily.last(), Some(&(DAYS_ON_AXIS, 5.0)));
        assert_eq!(
            slot_date(2024, daily.last().unwrap().0),
            NaiveDate::from_ymd_opt(2024, 12, 31)
        );
        let empty = YearSeries {
            points: Vec::new(),
            ..series
        };
        assert!(empty.daily_totals().is_empty());
    }

    #[test]
    fn test_malformed_rows() {
        assert!(RowError::BadDate("x".into()).is_malformed());
        assert!(RowError::NegativeDistance(-1.0).is_malformed());
        assert!(!RowError::OtherType("Ride".into()).is_malformed());
        assert!(!RowError::OtherYear(2020).is_malformed());
    }
}
