use crate::data::{day_slot, ActivityRecord, NormalizedActivity, RowError, Unit, Year};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// Date-time layouts tried on the date column, after any user-supplied one.
/// The first is what the Strava bulk export writes (`Aug 7, 2021, 12:44:45 AM`).
const DATETIME_FORMATS: &[&str] = &[
    "%b %d, %Y, %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Turns raw rows into `NormalizedActivity`s, or tells why a row is skipped.
#[derive(Debug, Clone)]
pub(crate) struct Normalizer {
    pub date_format: Option<String>,
    pub source_unit: Unit,
    pub unit: Unit,
    pub activity_type: Option<String>,
    pub years: Vec<Year>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            date_format: None,
            source_unit: Unit::Kilometers,
            unit: Unit::Miles,
            activity_type: None,
            years: Vec::new(),
        }
    }
}

impl Normalizer {
    pub fn normalize(&self, record: &ActivityRecord) -> Result<NormalizedActivity, RowError> {
        if let Some(wanted) = &self.activity_type {
            if !record.activity_type.eq_ignore_ascii_case(wanted) {
                return Err(RowError::OtherType(record.activity_type.clone()));
            }
        }
        let date = self
            .parse_date(&record.date)
            .ok_or_else(|| RowError::BadDate(record.date.clone()))?;
        let year = date.year();
        if !self.years.is_empty() && !self.years.contains(&year) {
            return Err(RowError::OtherYear(year));
        }
        let distance = parse_distance(&record.distance)?;
        Ok(NormalizedActivity {
            year,
            day: day_slot(date),
            distance: self.source_unit.convert(distance, self.unit),
        })
    }

    fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        let text = text.trim();
        if let Some(format) = &self.date_format {
            if let Some(date) = parse_with(text, format) {
                return Some(date);
            }
        }
        if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
            return Some(datetime.date_naive());
        }
        DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .map(|datetime| datetime.date())
            .or_else(|| {
                DATE_FORMATS
                    .iter()
                    .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
            })
    }
}

fn parse_with(text: &str, format: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(text, format)
        .map(|datetime| datetime.date())
        .or_else(|_| NaiveDate::parse_from_str(text, format))
        .ok()
}

fn parse_distance(text: &str) -> Result<f64, RowError> {
    let distance: f64 = text
        .trim()
        .parse()
        .map_err(|_| RowError::BadDistance(text.to_owned()))?;
    if !distance.is_finite() {
        return Err(RowError::BadDistance(text.to_owned()));
    }
    if distance < 0.0 {
        return Err(RowError::NegativeDistance(distance));
    }
    Ok(distance)
}
