use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use thiserror::Error;

use super::Series;

const WIDTH: u32 = 900;
const HEIGHT: u32 = 600;

pub const CONTENT_TYPE: &str = "image/svg+xml";

#[derive(Error, Debug)]
#[error("Chart rendering failed: {0}")]
pub struct ChartError(String);

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ChartError(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Scatter,
}

/// Everything needed to draw one chart
pub struct Chart<'a> {
    pub kind: ChartKind,
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    pub series: &'a [Series],
}

/// Render `chart` as an SVG document
pub fn render_svg(chart: &Chart<'_>) -> Result<Vec<u8>, ChartError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        draw(&root, chart)?;
        root.present()?;
    }
    Ok(svg.into_bytes())
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &Chart<'_>,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let (x_range, y_range) = axis_ranges(chart.series);
    let mut ctx = ChartBuilder::on(root)
        .caption(chart.title, ("sans-serif", 22).into_font())
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    ctx.configure_mesh()
        .x_desc(chart.x_desc)
        .y_desc(chart.y_desc)
        .x_label_formatter(&|x| format!("{:.0}", x))
        .draw()?;

    for (idx, series) in chart.series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let anno = match chart.kind {
            ChartKind::Line => ctx.draw_series(LineSeries::new(
                series.points.iter().copied(),
                color.stroke_width(2),
            ))?,
            ChartKind::Scatter => ctx.draw_series(
                series
                    .points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, color.filled())),
            )?,
        };
        anno.label(series.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 4), (x + 12, y + 4)], color.filled()));
    }

    if chart.series.len() > 1 {
        ctx.configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    Ok(())
}

/// Padded bounds covering every point; unit ranges when there is nothing to plot
fn axis_ranges(series: &[Series]) -> (Range<f64>, Range<f64>) {
    let mut points = series.iter().flat_map(|s| s.points.iter().copied());
    let Some((x0, y0)) = points.next() else {
        return (0.0..1.0, 0.0..1.0);
    };

    let (mut min_x, mut max_x, mut min_y, mut max_y) = (x0, x0, y0, y0);
    for (x, y) in points {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    (pad(min_x, max_x), pad(min_y, max_y))
}

fn pad(min: f64, max: f64) -> Range<f64> {
    if max > min {
        let margin = (max - min) * 0.05;
        (min - margin)..(max + margin)
    } else {
        (min - 1.0)..(max + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, points: &[(f64, f64)]) -> Series {
        Series {
            name: name.to_string(),
            points: points.to_vec(),
        }
    }

    #[test]
    fn test_line_chart_renders_svg() {
        let data = vec![
            series("Car", &[(1975.0, 680.0), (1976.0, 640.0)]),
            series("Truck", &[(1975.0, 800.0), (1976.0, 790.0)]),
        ];
        let chart = Chart {
            kind: ChartKind::Line,
            title: "CO2",
            x_desc: "Year",
            y_desc: "Real-World CO2 (g/mi)",
            series: &data,
        };

        let bytes = render_svg(&chart).unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_empty_chart_still_renders() {
        let chart = Chart {
            kind: ChartKind::Scatter,
            title: "Nothing",
            x_desc: "x",
            y_desc: "y",
            series: &[],
        };
        assert!(!render_svg(&chart).unwrap().is_empty());
    }

    #[test]
    fn test_axis_ranges_pad_single_point() {
        let data = vec![series("All", &[(2020.0, 300.0)])];
        let (x, y) = axis_ranges(&data);
        assert_eq!(x, 2019.0..2021.0);
        assert_eq!(y, 299.0..301.0);
    }

    #[test]
    fn test_axis_ranges_cover_all_series() {
        let data = vec![
            series("a", &[(0.0, 10.0)]),
            series("b", &[(100.0, 20.0)]),
        ];
        let (x, y) = axis_ranges(&data);
        assert!(x.start < 0.0 && x.end > 100.0);
        assert!(y.start < 10.0 && y.end > 20.0);
    }
}
