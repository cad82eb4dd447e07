// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Figures produced by the evaluation flows
//!
//! A figure is a plain description (line chart or grayscale image) that is
//! handed to a [`FigureSink`]. The SVG sink renders each figure to its own
//! file; the memory sink keeps them for inspection.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const CANVAS_WIDTH: f64 = 640.0;
const CANVAS_HEIGHT: f64 = 480.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 60.0;
const TICK_STEP: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendPosition {
    LowerRight,
}

/// A single polyline on a chart
#[derive(Debug, Clone)]
pub struct Series {
    /// Legend entry; unlabelled series stay out of the legend
    pub label: Option<String>,
    /// SVG color (name or hex)
    pub color: String,
    pub style: LineStyle,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct LineChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub series: Vec<Series>,
    pub legend: Option<LegendPosition>,
}

/// Grayscale image with a (possibly multi-line) title
#[derive(Debug, Clone)]
pub struct ImageFigure {
    pub title: String,
    pub width: usize,
    pub height: usize,
    /// Row-major intensities; rendered with min-max scaling
    pub pixels: Vec<f64>,
}

#[derive(Debug, Clone)]
pub enum Figure {
    Line(LineChart),
    Image(ImageFigure),
}

impl Figure {
    pub fn title(&self) -> &str {
        match self {
            Figure::Line(chart) => &chart.title,
            Figure::Image(image) => &image.title,
        }
    }

    /// Render as a standalone SVG document
    pub fn to_svg(&self) -> String {
        match self {
            Figure::Line(chart) => render_line_chart(chart),
            Figure::Image(image) => render_image(image),
        }
    }
}

/// Destination for figures as they are shown
pub trait FigureSink {
    fn show(&mut self, figure: Figure) -> Result<()>;
}

impl<S: FigureSink + ?Sized> FigureSink for &mut S {
    fn show(&mut self, figure: Figure) -> Result<()> {
        (**self).show(figure)
    }
}

impl<S: FigureSink + ?Sized> FigureSink for Box<S> {
    fn show(&mut self, figure: Figure) -> Result<()> {
        (**self).show(figure)
    }
}

/// Writes every figure to `<dir>/NNN_<slug>.svg`
#[derive(Debug)]
pub struct SvgDirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl SvgDirectorySink {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create figure directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: Vec::new(),
        })
    }

    /// Paths written so far, in display order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl FigureSink for SvgDirectorySink {
    fn show(&mut self, figure: Figure) -> Result<()> {
        let filename = format!("{:03}_{}.svg", self.written.len() + 1, slug(figure.title()));
        let path = self.dir.join(filename);
        std::fs::write(&path, figure.to_svg())
            .with_context(|| format!("Failed to write figure {}", path.display()))?;
        tracing::info!("Figure saved: {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

/// Keeps figures in memory (headless runs and tests)
#[derive(Debug, Default)]
pub struct MemorySink {
    pub figures: Vec<Figure>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FigureSink for MemorySink {
    fn show(&mut self, figure: Figure) -> Result<()> {
        tracing::debug!("Figure captured: {}", figure.title());
        self.figures.push(figure);
        Ok(())
    }
}

fn slug(title: &str) -> String {
    let mut out = String::new();
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    let trimmed: String = out.trim_end_matches('_').chars().take(40).collect();
    if trimmed.is_empty() {
        "figure".to_string()
    } else {
        trimmed
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn svg_header(out: &mut String, width: f64, height: f64) {
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
        w = width,
        h = height
    );
    let _ = writeln!(out, r#"<rect width="{}" height="{}" fill="white"/>"#, width, height);
}

/// Centered text block; one `tspan` per line
fn text_block(out: &mut String, x: f64, y: f64, size: f64, text: &str) {
    let _ = write!(out, r#"<text x="{:.1}" y="{:.1}" font-size="{}" text-anchor="middle">"#, x, y, size);
    for (i, line) in text.lines().enumerate() {
        let dy = if i == 0 { 0.0 } else { size * 1.2 };
        let _ = write!(out, r#"<tspan x="{:.1}" dy="{:.1}">{}</tspan>"#, x, dy, escape(line));
    }
    let _ = writeln!(out, "</text>");
}

fn ticks(range: (f64, f64)) -> Vec<f64> {
    let mut ticks = Vec::new();
    let mut k = (range.0 / TICK_STEP).ceil() as i64;
    loop {
        let value = k as f64 * TICK_STEP;
        if value > range.1 + 1e-9 {
            break;
        }
        ticks.push(value);
        k += 1;
    }
    ticks
}

fn render_line_chart(chart: &LineChart) -> String {
    let plot_w = CANVAS_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = CANVAS_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let (x0, x1) = chart.x_range;
    let (y0, y1) = chart.y_range;
    let px = |x: f64| MARGIN_LEFT + (x - x0) / (x1 - x0) * plot_w;
    let py = |y: f64| MARGIN_TOP + (1.0 - (y - y0) / (y1 - y0)) * plot_h;

    let mut out = String::new();
    svg_header(&mut out, CANVAS_WIDTH, CANVAS_HEIGHT);

    for t in ticks(chart.x_range) {
        let _ = writeln!(
            out,
            r#"<line x1="{x:.1}" y1="{y:.1}" x2="{x:.1}" y2="{y2:.1}" stroke="black"/><text x="{x:.1}" y="{ty:.1}" font-size="11" text-anchor="middle">{t:.1}</text>"#,
            x = px(t),
            y = MARGIN_TOP + plot_h,
            y2 = MARGIN_TOP + plot_h + 5.0,
            ty = MARGIN_TOP + plot_h + 18.0,
            t = t
        );
    }
    for t in ticks(chart.y_range) {
        let _ = writeln!(
            out,
            r#"<line x1="{x:.1}" y1="{y:.1}" x2="{x2:.1}" y2="{y:.1}" stroke="black"/><text x="{tx:.1}" y="{ty:.1}" font-size="11" text-anchor="end">{t:.1}</text>"#,
            x = MARGIN_LEFT - 5.0,
            x2 = MARGIN_LEFT,
            y = py(t),
            tx = MARGIN_LEFT - 8.0,
            ty = py(t) + 4.0,
            t = t
        );
    }

    // Series are clipped to the plot area
    let _ = writeln!(
        out,
        r#"<clipPath id="plot"><rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}"/></clipPath>"#,
        MARGIN_LEFT, MARGIN_TOP, plot_w, plot_h
    );
    for series in &chart.series {
        let dash = match series.style {
            LineStyle::Solid => "",
            LineStyle::Dashed => r#" stroke-dasharray="6,4""#,
        };
        for segment in finite_segments(&series.points) {
            let coords: Vec<String> = segment
                .iter()
                .map(|&(x, y)| format!("{:.2},{:.2}", px(x), py(y)))
                .collect();
            let _ = writeln!(
                out,
                r#"<polyline clip-path="url(#plot)" fill="none" stroke="{}" stroke-width="2"{} points="{}"/>"#,
                escape(&series.color),
                dash,
                coords.join(" ")
            );
        }
    }

    let _ = writeln!(
        out,
        r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="none" stroke="black"/>"#,
        MARGIN_LEFT, MARGIN_TOP, plot_w, plot_h
    );

    text_block(&mut out, MARGIN_LEFT + plot_w / 2.0, MARGIN_TOP - 14.0, 16.0, &chart.title);
    text_block(&mut out, MARGIN_LEFT + plot_w / 2.0, CANVAS_HEIGHT - 18.0, 13.0, &chart.x_label);
    let _ = writeln!(
        out,
        r#"<text x="0" y="0" font-size="13" text-anchor="middle" transform="translate(20,{:.1}) rotate(-90)">{}</text>"#,
        MARGIN_TOP + plot_h / 2.0,
        escape(&chart.y_label)
    );

    if let Some(position) = chart.legend {
        render_legend(&mut out, chart, position, plot_w, plot_h);
    }

    out.push_str("</svg>\n");
    out
}

fn render_legend(out: &mut String, chart: &LineChart, position: LegendPosition, plot_w: f64, plot_h: f64) {
    let entries: Vec<&Series> = chart.series.iter().filter(|s| s.label.is_some()).collect();
    if entries.is_empty() {
        return;
    }

    let row_h = 18.0;
    let box_w = 190.0;
    let box_h = row_h * entries.len() as f64 + 8.0;
    let x = MARGIN_LEFT + plot_w - box_w - 10.0;
    let y = match position {
        LegendPosition::LowerRight => MARGIN_TOP + plot_h - box_h - 10.0,
    };

    let _ = writeln!(
        out,
        r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="white" stroke="gray"/>"#,
        x, y, box_w, box_h
    );
    for (i, series) in entries.iter().enumerate() {
        let row_y = y + 4.0 + row_h * (i as f64 + 0.5);
        let _ = writeln!(
            out,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="2"/><text x="{:.1}" y="{:.1}" font-size="11">{}</text>"#,
            x + 6.0,
            row_y,
            x + 30.0,
            row_y,
            escape(&series.color),
            x + 36.0,
            row_y + 4.0,
            escape(series.label.as_deref().unwrap_or_default())
        );
    }
}

/// Split a polyline at non-finite points
fn finite_segments(points: &[(f64, f64)]) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for &(x, y) in points {
        if x.is_finite() && y.is_finite() {
            current.push((x, y));
        } else if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

fn render_image(image: &ImageFigure) -> String {
    let cell = (320 / image.width.max(1)).max(1) as f64;
    let title_lines = image.title.lines().count().max(1) as f64;
    let header = 16.0 + title_lines * 18.0;
    let width = image.width as f64 * cell + 40.0;
    let height = image.height as f64 * cell + header + 20.0;

    let (lo, hi) = image
        .pixels
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = if hi > lo { hi - lo } else { 1.0 };

    let mut out = String::new();
    svg_header(&mut out, width, height);
    text_block(&mut out, width / 2.0, 24.0, 15.0, &image.title);

    for (idx, &value) in image.pixels.iter().enumerate().take(image.width * image.height) {
        let row = idx / image.width;
        let col = idx % image.width;
        let level = if value.is_finite() {
            (((value - lo) / span) * 255.0).round().clamp(0.0, 255.0) as u8
        } else {
            0
        };
        let _ = writeln!(
            out,
            r#"<rect x="{:.1}" y="{:.1}" width="{c}" height="{c}" fill="rgb({l},{l},{l})"/>"#,
            20.0 + col as f64 * cell,
            header + row as f64 * cell,
            c = cell,
            l = level
        );
    }

    out.push_str("</svg>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chart() -> LineChart {
        LineChart {
            title: "Scores & <Rates>".to_string(),
            x_label: "x".to_string(),
            y_label: "y".to_string(),
            x_range: (0.0, 1.0),
            y_range: (0.0, 1.05),
            series: vec![
                Series {
                    label: Some("Class 0".to_string()),
                    color: "purple".to_string(),
                    style: LineStyle::Solid,
                    points: vec![(0.0, 0.0), (0.5, f64::NAN), (0.6, 0.9), (1.0, 1.0)],
                },
                Series {
                    label: None,
                    color: "black".to_string(),
                    style: LineStyle::Dashed,
                    points: vec![(0.0, 0.0), (1.0, 1.0)],
                },
            ],
            legend: Some(LegendPosition::LowerRight),
        }
    }

    #[test]
    fn test_line_chart_svg() {
        let svg = Figure::Line(sample_chart()).to_svg();

        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("Scores &amp; &lt;Rates&gt;"));
        assert!(svg.contains("stroke-dasharray"));
        assert!(svg.contains(">Class 0</text>"));
        // NaN splits the first series into two polylines, plus the diagonal
        assert_eq!(svg.matches("<polyline").count(), 3);
    }

    #[test]
    fn test_ticks_cover_range() {
        let t = ticks((0.0, 1.05));
        assert_eq!(t.len(), 6);
        assert!((t[5] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_image_svg_has_one_cell_per_pixel() {
        let figure = Figure::Image(ImageFigure {
            title: "Predicted: 1\nTrue: 2".to_string(),
            width: 3,
            height: 2,
            pixels: vec![0.0, 0.5, 1.0, 1.0, 0.5, 0.0],
        });
        let svg = figure.to_svg();

        assert_eq!(svg.matches("<rect").count(), 1 + 6);
        assert!(svg.contains("rgb(255,255,255)"));
        assert!(svg.contains("rgb(0,0,0)"));
        assert!(svg.contains(">Predicted: 1</tspan>"));
        assert!(svg.contains(">True: 2</tspan>"));
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Multi-class ROC curve"), "multi_class_roc_curve");
        assert_eq!(slug("Predicted: 3\nTrue: 3"), "predicted_3_true_3");
        assert_eq!(slug("!!"), "figure");
    }

    #[test]
    fn test_svg_directory_sink_numbers_files() {
        let dir = std::env::temp_dir().join(format!("face_eval_figures_{}", std::process::id()));
        let mut sink = SvgDirectorySink::new(&dir).unwrap();

        sink.show(Figure::Line(sample_chart())).unwrap();
        sink.show(Figure::Line(sample_chart())).unwrap();

        let names: Vec<String> = sink
            .written()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["001_scores_rates.svg", "002_scores_rates.svg"]);
        assert!(sink.written().iter().all(|p| p.exists()));

        std::fs::remove_dir_all(&dir).ok();
    }
}
