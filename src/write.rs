use crate::data::{slot_date, DaySlot, Year, YearMap};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Serialize)]
struct SeriesRow {
    year: Year,
    day: DaySlot,
    date: Option<NaiveDate>,
    distance: f64,
    cumulative: f64,
}

/// Basic CSV exporter for the cumulative series, one row per active day
pub(crate) fn write_series<W: std::io::Write>(
    writer: W,
    series: &YearMap,
) -> Result<(), anyhow::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for (&year, year_series) in series {
        for point in &year_series.points {
            wtr.serialize(SeriesRow {
                year,
                day: point.day,
                date: slot_date(year, point.day),
                distance: point.distance,
                cumulative: point.cumulative,
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}
