//! Filtering and aggregation over loaded records, shared by the job worker and
//! the synchronous plot routes, plus chart rendering.

pub mod chart;

use std::collections::BTreeMap;
use tracing::warn;

use crate::db::models::{VehicleRecord, AGGREGATE, CO2, MPG, WEIGHT};
use chart::{render_svg, Chart, ChartError, ChartKind};

/// One named line or point cloud on a chart
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

/// Result of filtering + grouping, with the number of rows dropped for malformed values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub series: Vec<Series>,
    pub skipped: u64,
}

/// A rendered chart together with what was left out of it
#[derive(Debug)]
pub struct Rendered {
    pub image: Vec<u8>,
    pub skipped: u64,
}

/// Parse a model year. Only plain digit strings count ("Prelim. 2022" does not).
pub fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Year of a fleet row, reading the preliminary "Prelim. 2022" row as its trailing year
fn fleet_year(raw: &str) -> Option<i32> {
    parse_year(raw).or_else(|| raw.trim().strip_prefix("Prelim.").and_then(parse_year))
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn into_series(groups: BTreeMap<String, Vec<(f64, f64)>>) -> Vec<Series> {
    groups
        .into_iter()
        .map(|(name, mut points)| {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            Series { name, points }
        })
        .collect()
}

/// CO2 per vehicle type across the all-manufacturer aggregate rows, for model
/// years in `start..=end`
pub fn co2_by_vehicle_type(records: &[VehicleRecord], start: i32, end: i32) -> Aggregation {
    let mut groups: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
    let mut skipped = 0;

    for record in records.iter().filter(|r| r.manufacturer() == AGGREGATE) {
        let Some(year) = parse_year(record.model_year()) else {
            skipped += 1;
            continue;
        };
        if year < start || year > end {
            continue;
        }
        let Some(co2) = parse_number(record.field(CO2)) else {
            skipped += 1;
            continue;
        };
        groups
            .entry(record.vehicle_type().to_string())
            .or_default()
            .push((f64::from(year), co2));
    }

    Aggregation {
        series: into_series(groups),
        skipped,
    }
}

/// CO2 of the fleet-wide aggregate row for every model year, preliminary year included
pub fn co2_overview(records: &[VehicleRecord]) -> Aggregation {
    let mut points = Vec::new();
    let mut skipped = 0;

    for record in records
        .iter()
        .filter(|r| r.manufacturer() == AGGREGATE && r.vehicle_type() == AGGREGATE)
    {
        match (fleet_year(record.model_year()), parse_number(record.field(CO2))) {
            (Some(year), Some(co2)) => points.push((f64::from(year), co2)),
            _ => skipped += 1,
        }
    }

    let mut groups = BTreeMap::new();
    if !points.is_empty() {
        groups.insert(AGGREGATE.to_string(), points);
    }
    Aggregation {
        series: into_series(groups),
        skipped,
    }
}

/// Weight against real-world MPG for every record of one model year.
/// The dataset writes missing MPG as `-`; those rows are skipped.
pub fn weight_vs_mpg(records: &[VehicleRecord], year: &str) -> Aggregation {
    let mut points = Vec::new();
    let mut skipped = 0;

    for record in records.iter().filter(|r| r.model_year() == year) {
        match (parse_number(record.field(WEIGHT)), parse_number(record.field(MPG))) {
            (Some(weight), Some(mpg)) => points.push((weight, mpg)),
            _ => skipped += 1,
        }
    }

    let mut groups = BTreeMap::new();
    if !points.is_empty() {
        groups.insert(year.to_string(), points);
    }
    Aggregation {
        series: into_series(groups),
        skipped,
    }
}

fn render(
    kind: ChartKind,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    agg: Aggregation,
) -> Result<Rendered, ChartError> {
    if agg.skipped > 0 {
        warn!("{}: skipped {} records with malformed values", title, agg.skipped);
    }
    let image = render_svg(&Chart {
        kind,
        title,
        x_desc,
        y_desc,
        series: &agg.series,
    })?;
    Ok(Rendered {
        image,
        skipped: agg.skipped,
    })
}

/// Line chart of CO2 by vehicle type, the artifact of an analysis job
pub fn co2_trend_chart(
    records: &[VehicleRecord],
    start: i32,
    end: i32,
) -> Result<Rendered, ChartError> {
    render(
        ChartKind::Line,
        &format!("CO2 Emissions by Vehicle Type from {}-{}", start, end),
        "Year",
        CO2,
        co2_by_vehicle_type(records, start, end),
    )
}

pub fn co2_overview_chart(records: &[VehicleRecord]) -> Result<Rendered, ChartError> {
    render(
        ChartKind::Scatter,
        "Average Vehicle CO2 Emissions by Model Year",
        "Year",
        CO2,
        co2_overview(records),
    )
}

pub fn weight_mpg_chart(records: &[VehicleRecord], year: &str) -> Result<Rendered, ChartError> {
    render(
        ChartKind::Scatter,
        &format!("Vehicle Weight vs Fuel Economy in {}", year),
        WEIGHT,
        "Miles per Gallon",
        weight_vs_mpg(records, year),
    )
}
