use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use compute::Mileage;
use data::{Error, Unit, Year, YearMap};
use normalize::Normalizer;
use read::{open_activities, read_activities, Columns};
use render::{render, show, RenderOptions};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use write::write_series;

mod compute;
mod data;
mod normalize;
mod read;
mod render;
mod write;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plot cumulative yearly mileage from an activity export", long_about = None)]
struct Cli {
    /// Activity export CSV (activities.csv of a Strava bulk export)
    #[arg(short, long, default_value = "activities.csv", value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Chart path, PNG or SVG by extension; shows the chart in a viewer when omitted
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Distance unit of the chart
    #[arg(short, long, value_enum, default_value_t = UnitOpt::Miles)]
    units: UnitOpt,

    /// Distance unit of the export's distance column
    #[arg(long, value_enum, default_value_t = UnitOpt::Km)]
    source_units: UnitOpt,

    /// Only plot these years (repeatable)
    #[arg(short, long)]
    year: Vec<Year>,

    /// Activity type to keep, `all` to keep everything. Ignored with a warning
    /// when the file has no type column
    #[arg(short = 't', long, default_value = "Run")]
    activity_type: String,

    /// Chart title
    #[arg(long)]
    title: Option<String>,

    /// Header of the date column
    #[arg(long, default_value = "Activity Date")]
    date_column: String,

    /// Header of the distance column
    #[arg(long, default_value = "Distance")]
    distance_column: String,

    /// Header of the activity type column
    #[arg(long, default_value = "Activity Type")]
    type_column: String,

    /// Extra chrono format for the date column, tried before the built-in ones
    #[arg(long)]
    date_format: Option<String>,

    /// Also write the cumulative series as CSV (`-` for stdout)
    #[arg(long, value_hint = ValueHint::FilePath)]
    csv: Option<PathBuf>,

    /// Print the running total every N plotted days (0 to disable)
    #[arg(long, default_value_t = 30)]
    annotate_every: usize,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum UnitOpt {
    #[value(alias = "mi")]
    Miles,
    #[value(alias = "kilometers")]
    Km,
    #[value(alias = "meters")]
    M,
}

impl From<UnitOpt> for Unit {
    fn from(value: UnitOpt) -> Self {
        match value {
            UnitOpt::Miles => Unit::Miles,
            UnitOpt::Km => Unit::Kilometers,
            UnitOpt::M => Unit::Meters,
        }
    }
}

impl Cli {
    fn activity_type(&self) -> Option<&str> {
        if self.activity_type.eq_ignore_ascii_case("all") {
            None
        } else {
            Some(self.activity_type.as_str())
        }
    }

    fn columns(&self) -> Columns {
        Columns {
            date: self.date_column.clone(),
            distance: self.distance_column.clone(),
            activity_type: self.activity_type().map(|_| self.type_column.clone()),
        }
    }

    fn normalizer(&self) -> Normalizer {
        Normalizer {
            date_format: self.date_format.clone(),
            source_unit: self.source_units.into(),
            unit: self.units.into(),
            activity_type: self.activity_type().map(str::to_owned),
            years: self.year.clone(),
        }
    }

    fn render_options(&self, series: &YearMap) -> RenderOptions {
        let unit = Unit::from(self.units);
        let years: Vec<Year> = series.keys().copied().collect();
        RenderOptions {
            title: self
                .title
                .clone()
                .unwrap_or_else(|| default_title(&years, self.activity_type())),
            y_label: format!("Cumulative distance ({})", unit.label()),
            annotate_every: self.annotate_every,
            ..RenderOptions::default()
        }
    }
}

/// `2023 Run Mileage`, `2021-2023 Mileage`, ...
fn default_title(years: &[Year], activity_type: Option<&str>) -> String {
    let span = match (years.first(), years.last()) {
        (Some(first), Some(last)) if first == last => format!("{first} "),
        (Some(first), Some(last)) => format!("{first}-{last} "),
        _ => String::new(),
    };
    match activity_type {
        Some(activity_type) => format!("{span}{activity_type} Mileage"),
        None => format!("{span}Mileage"),
    }
}

fn write_csv(path: &Path, series: &YearMap) -> Result<()> {
    if path == Path::new("-") {
        write_series(io::stdout(), series)
    } else {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_series(file, series)
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut mileage = Mileage::new();
    let stats = read_activities(
        open_activities(&cli.input)?,
        &cli.columns(),
        &cli.normalizer(),
        &mut mileage,
    )?;
    info!(
        "Read {} rows from {}: {} used, {} malformed, {} filtered out",
        stats.rows,
        cli.input.display(),
        stats.used,
        stats.malformed,
        stats.filtered
    );

    let series = mileage.series();
    let kind = cli.activity_type().unwrap_or("all");
    for year_series in series.values() {
        info!(
            "Number of {kind} activities in {}: {} ({:.2} {})",
            year_series.year,
            year_series.activities,
            year_series.total(),
            Unit::from(cli.units).label()
        );
        debug!("Series {}: {:?}", year_series.year, year_series.pairs());
    }

    let opts = cli.render_options(&series);
    match &cli.output {
        Some(path) => {
            render(&series, path, &opts)?;
            info!("Wrote chart: {}", path.display());
        }
        None => match show(&series, &opts) {
            Ok(path) => info!("Showing chart: {}", path.display()),
            Err(Error::Viewer { path, message }) => {
                warn!("{message}; chart left at {}", path.display())
            }
            Err(e) => return Err(e.into()),
        },
    }

    if let Some(path) = &cli.csv {
        write_csv(path, &series)?;
        info!("Wrote series CSV: {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    run(&cli)
}

#[cfg(test)]
mod tests {
    use super::{default_title, run, Cli, UnitOpt};
    use crate::data::{Error, Unit};
    use clap::{CommandFactory, Parser};
    use std::{ffi::OsStr, fs};

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["mileage"]).unwrap();
        assert_eq!(cli.input.to_str(), Some("activities.csv"));
        assert_eq!(cli.output, None);
        assert_eq!(cli.units, UnitOpt::Miles);
        assert_eq!(cli.activity_type(), Some("Run"));
        assert!(cli.year.is_empty());
        let normalizer = cli.normalizer();
        assert_eq!(normalizer.source_unit, Unit::Kilometers);
        assert_eq!(normalizer.unit, Unit::Miles);
        assert_eq!(
            cli.columns().activity_type.as_deref(),
            Some("Activity Type")
        );
    }

    #[test]
    fn cli_options() {
        let cli = Cli::try_parse_from([
            "mileage", "--input", "a.csv", "--output", "b.svg", "--units", "km", "--year",
            "2022", "--year", "2023", "-t", "all",
        ])
        .unwrap();
        assert_eq!(cli.units, UnitOpt::Km);
        assert_eq!(cli.year, [2022, 2023]);
        assert_eq!(cli.activity_type(), None);
        assert_eq!(cli.columns().activity_type, None);
        assert_eq!(cli.normalizer().years, [2022, 2023]);
        assert!(Cli::try_parse_from(["mileage", "--units", "furlongs"]).is_err());
    }

    #[test]
    fn help_is_not_an_error() {
        let err = Cli::try_parse_from(["mileage", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn titles() {
        assert_eq!(default_title(&[2021], Some("Run")), "2021 Run Mileage");
        assert_eq!(default_title(&[2021, 2023], None), "2021-2023 Mileage");
        assert_eq!(default_title(&[], Some("Walk")), "Walk Mileage");
    }

    #[test]
    fn header_only_input_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("activities.csv");
        let output = dir.path().join("chart.png");
        fs::write(&input, "Activity Date,Activity Type,Distance\n").unwrap();
        let cli = Cli::try_parse_from([
            OsStr::new("mileage"),
            OsStr::new("--input"),
            input.as_os_str(),
            OsStr::new("--output"),
            output.as_os_str(),
        ])
        .unwrap();
        let err = run(&cli).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::EmptyResult)));
        assert!(!output.exists());
    }

    #[test]
    fn missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("nope.csv");
        let cli = Cli::try_parse_from([
            OsStr::new("mileage"),
            OsStr::new("--input"),
            input.as_os_str(),
            OsStr::new("--output"),
            dir.path().join("chart.png").as_os_str(),
        ])
        .unwrap();
        let err = run(&cli).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InputNotFound { .. })
        ));
    }
}
