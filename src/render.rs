use crate::data::{DaySlot, Error, YearMap, DAYS_ON_AXIS};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// First slot of every month on the leap-year aligned axis.
const MONTH_STARTS: [DaySlot; 12] = [1, 32, 61, 92, 122, 153, 183, 214, 245, 275, 306, 336];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone)]
pub(crate) struct RenderOptions {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub size: (u32, u32),
    /// Print the running total every that many plotted days, 0 to disable.
    pub annotate_every: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: "Mileage".into(),
            x_label: "Day of year".into(),
            y_label: "Cumulative distance".into(),
            size: (1600, 800),
            annotate_every: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartKind {
    Png,
    Svg,
}

impl ChartKind {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => ChartKind::Svg,
            _ => ChartKind::Png,
        }
    }
}

/// Draws one cumulative line per year into `path`, PNG unless it ends in `.svg`.
pub(crate) fn render(series: &YearMap, path: &Path, opts: &RenderOptions) -> Result<(), Error> {
    if series.is_empty() {
        return Err(Error::EmptyResult);
    }
    let drawn = match ChartKind::from_path(path) {
        ChartKind::Png => draw_chart(
            BitMapBackend::new(path, opts.size).into_drawing_area(),
            series,
            opts,
        ),
        ChartKind::Svg => draw_chart(
            SVGBackend::new(path, opts.size).into_drawing_area(),
            series,
            opts,
        ),
    };
    drawn.map_err(|e| Error::Render {
        path: path.to_owned(),
        message: format!("{e:#}"),
    })
}

/// Renders into a temporary PNG and hands it to the desktop's image viewer.
/// Returns the image path so it can be reported when no viewer shows up.
pub(crate) fn show(series: &YearMap, opts: &RenderOptions) -> Result<PathBuf, Error> {
    let path = preview_path();
    render(series, &path, opts)?;
    open_viewer(&path)?;
    Ok(path)
}

/// One file per process, so concurrent runs don't draw over each other.
fn preview_path() -> PathBuf {
    std::env::temp_dir().join(format!("mileage-{}.png", std::process::id()))
}

fn viewer_command(path: &Path) -> Command {
    #[cfg(target_os = "macos")]
    let mut cmd = Command::new("open");
    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]);
        cmd
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut cmd = Command::new("xdg-open");
    cmd.arg(path);
    cmd
}

fn open_viewer(path: &Path) -> Result<(), Error> {
    let viewer_error = |message: String| Error::Viewer {
        path: path.to_owned(),
        message,
    };
    let mut cmd = viewer_command(path);
    debug!("Opening viewer: {cmd:?}");
    let status = cmd.status().map_err(|e| viewer_error(e.to_string()))?;
    if !status.success() {
        return Err(viewer_error(format!("viewer exited with {status}")));
    }
    Ok(())
}

fn month_label(slot: DaySlot) -> String {
    MONTH_STARTS
        .iter()
        .rposition(|&start| start <= slot)
        .map(|month| MONTH_NAMES[month].to_owned())
        .unwrap_or_default()
}

/// Points that get their value printed: every `every`-th plotted day, and
/// always the last one.
fn annotation_points(daily: &[(DaySlot, f64)], every: usize) -> Vec<(DaySlot, f64)> {
    let mut points: Vec<(DaySlot, f64)> = if every == 0 {
        Vec::new()
    } else {
        daily.iter().skip(every - 1).step_by(every).copied().collect()
    };
    if let Some(&last) = daily.last() {
        if points.last() != Some(&last) {
            points.push(last);
        }
    }
    points
}

fn y_max(series: &YearMap) -> f64 {
    let top = series.values().map(|s| s.total()).fold(0.0, f64::max);
    (top * 1.05).max(1.0)
}

fn draw_chart<DB>(
    root: DrawingArea<DB, Shift>,
    series: &YearMap,
    opts: &RenderOptions,
) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let axis_font = FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal);
    let mut chart = ChartBuilder::on(&root)
        .caption(&opts.title, ("sans-serif", 32))
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(
            (1..DAYS_ON_AXIS).with_key_points(MONTH_STARTS.to_vec()),
            0.0..y_max(series),
        )?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .bold_line_style(&BLACK.mix(0.1))
        .x_labels(MONTH_STARTS.len())
        .x_label_formatter(&|slot| month_label(*slot))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .x_desc(&opts.x_label)
        .y_desc(&opts.y_label)
        .label_style(axis_font.clone().color(&BLACK.mix(0.85)))
        .draw()?;

    let note_font = FontDesc::new(FontFamily::SansSerif, 14.0, FontStyle::Normal);
    for (idx, (year, year_series)) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let style = ShapeStyle {
            color,
            filled: false,
            stroke_width: 2,
        };
        let daily = year_series.daily_totals();
        chart
            .draw_series(LineSeries::new(daily.iter().copied(), style))?
            .label(year.to_string())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], color));

        let notes = annotation_points(&daily, opts.annotate_every);
        chart.draw_series(notes.into_iter().map(|(day, total)| {
            Text::new(
                format!("{:.2}", total),
                (day, total),
                note_font.color(&color),
            )
        }))?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK.mix(0.3))
        .label_font(axis_font.color(&BLACK))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    root.present()?;
    Ok(())
}
