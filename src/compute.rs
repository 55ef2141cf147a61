use crate::{
    data::{DaySlot, NormalizedActivity, SeriesPoint, Year, YearMap, YearSeries},
    read::ActivityUser,
};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct YearDays {
    activities: usize,
    days: BTreeMap<DaySlot, f64>,
}

/// This is where mileage is accumulated while reading the activities. Ordered
/// maps all the way down, so the output never depends on hashing order.
#[derive(Debug, Default)]
pub(crate) struct Mileage {
    years: BTreeMap<Year, YearDays>,
}

impl Mileage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Running totals per year. A year only shows up if it had at least one
    /// activity.
    pub fn series(&self) -> YearMap {
        self.years
            .iter()
            .map(|(&year, days)| {
                let mut cumulative = 0.0;
                let points = days
                    .days
                    .iter()
                    .map(|(&day, &distance)| {
                        cumulative += distance;
                        SeriesPoint {
                            day,
                            distance,
                            cumulative,
                        }
                    })
                    .collect();
                let series = YearSeries {
                    year,
                    activities: days.activities,
                    points,
                };
                (year, series)
            })
            .collect()
    }
}

impl ActivityUser for Mileage {
    fn use_activity(&mut self, activity: NormalizedActivity) {
        let year = self.years.entry(activity.year).or_default();
        year.activities += 1;
        *year.days.entry(activity.day).or_insert(0.0) += activity.distance;
    }
}
