//! SVG line charts for training curves
//!
//! Renders one or more line-chart panels side by side into a single SVG
//! file. Each series becomes one `<polyline>`.

use std::fmt::Write as _;
use std::path::Path;

/// Panel styling constants
const PANEL_WIDTH: f64 = 600.0;
const PANEL_HEIGHT: f64 = 420.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 60.0;
const MARGIN_LEFT: f64 = 70.0;
const GRID_LINES: usize = 5;

pub const COLOR_TRAIN: &str = "#3498db";
pub const COLOR_VALIDATION: &str = "#e67e22";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// A data series for a line chart
#[derive(Debug, Clone)]
pub struct DataSeries {
    pub name: String,
    /// `(x, y)` points in drawing order
    pub points: Vec<(f64, f64)>,
    pub color: String,
}

impl DataSeries {
    pub fn new(name: &str, points: Vec<(f64, f64)>, color: &str) -> Self {
        Self {
            name: name.to_string(),
            points,
            color: color.to_string(),
        }
    }
}

/// One chart panel
#[derive(Debug, Clone)]
pub struct LineChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<DataSeries>,
    /// Fixed y range; derived from the data when `None`
    pub y_range: Option<(f64, f64)>,
}

impl LineChart {
    pub fn new(title: &str, x_label: &str, y_label: &str) -> Self {
        Self {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            series: Vec::new(),
            y_range: None,
        }
    }

    pub fn with_series(mut self, series: DataSeries) -> Self {
        self.series.push(series);
        self
    }

    pub fn with_y_range(mut self, min: f64, max: f64) -> Self {
        self.y_range = Some((min, max));
        self
    }
}

/// Render the panels left to right into one SVG document
pub fn render_line_charts(charts: &[LineChart]) -> String {
    let width = PANEL_WIDTH * charts.len().max(1) as f64;
    let mut svg = String::new();

    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
        w = width,
        h = PANEL_HEIGHT
    );
    let _ = write!(
        svg,
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        width, PANEL_HEIGHT
    );

    for (i, chart) in charts.iter().enumerate() {
        render_panel(&mut svg, chart, i as f64 * PANEL_WIDTH);
    }

    svg.push_str("</svg>");
    svg
}

/// Render the panels and write them to `output_path`
pub fn generate_line_charts(charts: &[LineChart], output_path: &Path) -> std::io::Result<()> {
    std::fs::write(output_path, render_line_charts(charts))
}

fn render_panel(svg: &mut String, chart: &LineChart, offset_x: f64) {
    let plot_width = PANEL_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = PANEL_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let left = offset_x + MARGIN_LEFT;
    let bottom = MARGIN_TOP + plot_height;

    let (x_min, x_max, data_y_min, data_y_max) = find_ranges(&chart.series);
    let (y_min, y_max) = chart.y_range.unwrap_or((data_y_min.min(0.0), data_y_max));
    let x_span = if x_max > x_min { x_max - x_min } else { 1.0 };
    let y_span = if y_max > y_min { y_max - y_min } else { 1.0 };

    let to_x = |x: f64| left + (x - x_min) / x_span * plot_width;
    let to_y = |y: f64| bottom - (y.clamp(y_min, y_min + y_span) - y_min) / y_span * plot_height;

    // Title
    let _ = write!(
        svg,
        r#"<text x="{}" y="30" text-anchor="middle" font-family="Arial, sans-serif" font-size="16" font-weight="bold" fill="{}">{}</text>"#,
        left + plot_width / 2.0,
        COLOR_TEXT,
        escape_xml(&chart.title)
    );

    // Grid lines and y tick labels
    for i in 0..=GRID_LINES {
        let fraction = i as f64 / GRID_LINES as f64;
        let y = bottom - fraction * plot_height;
        let _ = write!(
            svg,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            left,
            y,
            left + plot_width,
            y,
            COLOR_GRID
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="11" fill="{}">{:.2}</text>"#,
            left - 8.0,
            y + 4.0,
            COLOR_TEXT,
            y_min + fraction * y_span
        );
    }

    // Axes
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        left,
        bottom,
        left + plot_width,
        bottom,
        COLOR_AXIS
    );
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        left,
        MARGIN_TOP,
        left,
        bottom,
        COLOR_AXIS
    );

    // Axis labels
    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="13" fill="{}">{}</text>"#,
        left + plot_width / 2.0,
        PANEL_HEIGHT - 15.0,
        COLOR_TEXT,
        escape_xml(&chart.x_label)
    );
    let label_x = offset_x + 18.0;
    let _ = write!(
        svg,
        r#"<text x="{x}" y="{y}" text-anchor="middle" font-family="Arial, sans-serif" font-size="13" fill="{}" transform="rotate(-90 {x} {y})">{}</text>"#,
        COLOR_TEXT,
        escape_xml(&chart.y_label),
        x = label_x,
        y = PANEL_HEIGHT / 2.0
    );

    // X tick labels from the first series
    if let Some(first) = chart.series.first() {
        for &(x, _) in &first.points {
            let _ = write!(
                svg,
                r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="11" fill="{}">{:.0}</text>"#,
                to_x(x),
                bottom + 18.0,
                COLOR_TEXT,
                x
            );
        }
    }

    // Series
    for series in &chart.series {
        let points: Vec<String> = series
            .points
            .iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|&(x, y)| format!("{:.2},{:.2}", to_x(x), to_y(y)))
            .collect();
        if points.is_empty() {
            continue;
        }

        let _ = write!(
            svg,
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2.5"/>"#,
            points.join(" "),
            series.color
        );
    }

    // Legend
    let mut legend_y = MARGIN_TOP + 10.0;
    for series in &chart.series {
        let legend_x = left + plot_width - 130.0;
        let _ = write!(
            svg,
            r#"<rect x="{}" y="{}" width="14" height="14" fill="{}"/>"#,
            legend_x, legend_y, series.color
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            legend_x + 20.0,
            legend_y + 11.0,
            COLOR_TEXT,
            escape_xml(&series.name)
        );
        legend_y += 22.0;
    }
}

/// Data bounds over every finite point; `(0, 1, 0, 1)` when there is none
fn find_ranges(series: &[DataSeries]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for s in series {
        for &(x, y) in s.points.iter().filter(|(x, y)| x.is_finite() && y.is_finite()) {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }

    if x_min > x_max {
        return (0.0, 1.0, 0.0, 1.0);
    }
    (x_min, x_max, y_min, y_max)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn accuracy_chart() -> LineChart {
        LineChart::new("Model Accuracy", "Epoch", "Accuracy")
            .with_y_range(0.0, 1.0)
            .with_series(DataSeries::new(
                "train",
                vec![(1.0, 0.4), (2.0, 0.6), (3.0, 0.7)],
                COLOR_TRAIN,
            ))
            .with_series(DataSeries::new(
                "validation",
                vec![(1.0, 0.3), (2.0, 0.5), (3.0, 0.55)],
                COLOR_VALIDATION,
            ))
    }

    #[test]
    fn test_line_chart_generation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chart.svg");
        generate_line_charts(&[accuracy_chart()], &path).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains("Model Accuracy"));
    }

    #[test]
    fn test_panels_are_laid_out_side_by_side() {
        let loss = LineChart::new("Model Loss", "Epoch", "Loss")
            .with_series(DataSeries::new("train", vec![(1.0, 2.3), (2.0, 1.1)], COLOR_TRAIN));
        let svg = render_line_charts(&[accuracy_chart(), loss]);
        assert!(svg.contains(r#"width="1200""#));
        assert_eq!(svg.matches("<polyline").count(), 3);
    }

    #[test]
    fn test_non_finite_points_are_skipped() {
        let chart = LineChart::new("Loss", "Epoch", "Loss")
            .with_series(DataSeries::new(
                "val",
                vec![(1.0, f64::NAN), (2.0, f64::INFINITY)],
                COLOR_VALIDATION,
            ))
            .with_series(DataSeries::new("train", vec![(1.0, 0.9), (2.0, f64::NAN)], COLOR_TRAIN));
        let svg = render_line_charts(&[chart]);

        assert_eq!(svg.matches("<polyline").count(), 1);
        assert!(!svg.contains("NaN"));
        assert!(!svg.contains("inf"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a < b & c"), "a &lt; b &amp; c");
    }
}
