use crate::{
    data::{ActivityRecord, Error, NormalizedActivity},
    normalize::Normalizer,
};
use std::{borrow::Cow, fs::File, io::ErrorKind, path::Path};
use tracing::{debug, warn};

/// Trait for doing something with a `NormalizedActivity` read from a CSV file.
/// Used by the aggregation to accumulate mileage, but also used for mock tests
/// to check we get the correct results from reading a CSV stream.
pub(crate) trait ActivityUser {
    fn use_activity(&mut self, activity: NormalizedActivity);
}

/// Header names of the columns we care about. Everything else in the export is
/// ignored. The type column may be absent from the file, in which case every
/// row reads with an empty type.
#[derive(Debug, Clone)]
pub(crate) struct Columns {
    pub date: String,
    pub distance: String,
    pub activity_type: Option<String>,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            date: "Activity Date".into(),
            distance: "Distance".into(),
            activity_type: Some("Activity Type".into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    date: usize,
    distance: usize,
    activity_type: Option<usize>,
}

/// Lazy sequence of raw rows, see `load_activities`.
pub(crate) struct ActivityRecords<R> {
    records: csv::StringRecordsIntoIter<R>,
    index: ColumnIndex,
}

impl<R> ActivityRecords<R> {
    pub fn has_activity_type(&self) -> bool {
        self.index.activity_type.is_some()
    }
}

impl<R: std::io::Read> Iterator for ActivityRecords<R> {
    type Item = Result<ActivityRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        let field = |i: usize| record.get(i).unwrap_or_default().to_owned();
        Some(Ok(ActivityRecord {
            line: record.position().map_or(0, |p| p.line()),
            date: field(self.index.date),
            distance: field(self.index.distance),
            activity_type: self.index.activity_type.map(field).unwrap_or_default(),
        }))
    }
}

pub(crate) fn open_activities(path: &Path) -> Result<File, Error> {
    File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => Error::InputNotFound {
            path: path.to_owned(),
        },
        _ => Error::Io {
            path: path.to_owned(),
            source,
        },
    })
}

/// CSV loader for activity exports. Columns are looked up by header name,
/// ignoring case; the first match wins since Strava exports carry two
/// `Distance` columns and only the first one is in kilometers.
pub(crate) fn load_activities<R: std::io::Read>(
    reader: R,
    columns: &Columns,
) -> Result<ActivityRecords<R>, Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
    };
    let require = |name: &str| find(name).ok_or_else(|| Error::MissingColumn(name.to_owned()));
    let index = ColumnIndex {
        date: require(&columns.date)?,
        distance: require(&columns.distance)?,
        activity_type: columns.activity_type.as_deref().and_then(find),
    };
    Ok(ActivityRecords {
        records: rdr.into_records(),
        index,
    })
}

/// What happened to the rows of one file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadStats {
    pub rows: usize,
    pub used: usize,
    pub malformed: usize,
    pub filtered: usize,
}

/// Reads every row, normalizes it and hands the survivors to `user`. Bad rows
/// are logged and counted but don't stop the reading; a broken file does.
/// Without a type column the type filter can't apply and is dropped.
pub(crate) fn read_activities<R: std::io::Read, U: ActivityUser>(
    reader: R,
    columns: &Columns,
    normalizer: &Normalizer,
    user: &mut U,
) -> Result<ReadStats, Error> {
    let records = load_activities(reader, columns)?;
    let mut normalizer = Cow::Borrowed(normalizer);
    if normalizer.activity_type.is_some() && !records.has_activity_type() {
        warn!(
            "No {:?} column, keeping every activity type",
            columns.activity_type.as_deref().unwrap_or_default()
        );
        normalizer.to_mut().activity_type = None;
    }
    let mut stats = ReadStats::default();
    for result in records {
        let record = result?;
        stats.rows += 1;
        match normalizer.normalize(&record) {
            Ok(activity) => {
                stats.used += 1;
                user.use_activity(activity);
            }
            Err(e) if e.is_malformed() => {
                stats.malformed += 1;
                warn!("Skipping line {}: {e}", record.line);
            }
            Err(e) => {
                stats.filtered += 1;
                debug!("Skipping line {}: {e}", record.line);
            }
        }
    }
    Ok(stats)
}
