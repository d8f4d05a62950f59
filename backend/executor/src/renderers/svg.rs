//! Native SVG renderer: plain geometry per chart family, no layout engine.

use std::fmt::Write;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use chartforge_core::{Artifact, ChartType, Dataset, OutputFormat, RenderError, RenderOptions, Renderer};

pub const NATIVE_METHOD: &str = "native";

const PALETTE: [&str; 8] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
];

/// Plot geometry shared by several chart types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Geometry {
    VerticalBars,
    HorizontalBars,
    GroupedBars,
    StackedBars,
    Line { step: bool, fill: bool },
    StackedArea,
    Points { sized: bool },
    Pie,
    Radar,
    Cells,
    Boxes,
}

impl Geometry {
    fn of(chart: ChartType) -> Self {
        use ChartType::*;
        match chart {
            BarChartVertical | Histogram | Waterfall | Pareto | ErrorBar => Geometry::VerticalBars,
            BarChartHorizontal | Funnel | Gantt => Geometry::HorizontalBars,
            GroupedBar => Geometry::GroupedBars,
            StackedBar => Geometry::StackedBars,
            LineChart | ControlChart => Geometry::Line { step: false, fill: false },
            StepChart => Geometry::Line { step: true, fill: false },
            AreaChart => Geometry::Line { step: false, fill: true },
            StackedAreaChart => Geometry::StackedArea,
            ScatterPlot | Hexbin => Geometry::Points { sized: false },
            BubbleChart => Geometry::Points { sized: true },
            PieChart => Geometry::Pie,
            RadarChart => Geometry::Radar,
            Heatmap => Geometry::Cells,
            BoxPlot | ViolinPlot => Geometry::Boxes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SvgRenderer {
    width: f64,
    height: f64,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self { width: 800.0, height: 500.0 }
    }
}

impl SvgRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width: f64::from(width.max(200)), height: f64::from(height.max(150)) }
    }

    /// Draw `chart` to an SVG document.
    pub fn draw(&self, chart: ChartType, dataset: &Dataset, options: &RenderOptions) -> Result<String, RenderError> {
        if dataset.is_empty() {
            return Err(RenderError::UnsupportedShape { chart, reason: "dataset is empty".into() });
        }
        let palette: Vec<&str> = options
            .theme
            .as_ref()
            .and_then(|t| t.palette.as_ref())
            .filter(|p| !p.is_empty())
            .map(|p| p.iter().map(String::as_str).collect())
            .unwrap_or_else(|| PALETTE.to_vec());
        let background = options
            .theme
            .as_ref()
            .and_then(|t| t.background.as_deref())
            .unwrap_or("#ffffff");

        let mut canvas = Canvas {
            svg: String::new(),
            plot: Plot { x: 70.0, y: 50.0, w: self.width - 110.0, h: self.height - 110.0 },
            palette,
        };
        let _ = write!(
            canvas.svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="100%" height="100%" fill="{bg}"/>"#,
            w = self.width,
            h = self.height,
            bg = escape(background),
        );
        let title = options.title.as_deref().unwrap_or(chart.display_name());
        let _ = write!(
            canvas.svg,
            r#"<text x="{}" y="28" text-anchor="middle" font-size="18" font-family="sans-serif">{}</text>"#,
            self.width / 2.0,
            escape(title)
        );

        match Geometry::of(chart) {
            Geometry::VerticalBars => canvas.vertical_bars(dataset),
            Geometry::HorizontalBars => canvas.horizontal_bars(dataset),
            Geometry::GroupedBars => canvas.grouped_bars(dataset),
            Geometry::StackedBars => canvas.stacked_bars(dataset),
            Geometry::Line { step, fill } => canvas.line(&dataset.values, step, fill, 0),
            Geometry::StackedArea => canvas.stacked_area(dataset),
            Geometry::Points { sized } => canvas.points(dataset, sized),
            Geometry::Pie => canvas.pie(dataset).map_err(|reason| RenderError::UnsupportedShape { chart, reason })?,
            Geometry::Radar => canvas.radar(dataset),
            Geometry::Cells => canvas.cells(dataset),
            Geometry::Boxes => canvas.boxes(dataset),
        }

        if !matches!(Geometry::of(chart), Geometry::Pie | Geometry::Radar | Geometry::Cells) {
            let axes = chart.axis_labels();
            canvas.axes(axes.x, axes.y);
        }
        canvas.svg.push_str("</svg>");
        Ok(canvas.svg)
    }
}

#[async_trait]
impl Renderer for SvgRenderer {
    fn method(&self) -> &str {
        NATIVE_METHOD
    }

    async fn render(
        &self,
        chart: ChartType,
        dataset: &Dataset,
        options: &RenderOptions,
        _timeout: Duration,
    ) -> Result<Artifact, RenderError> {
        if options.format != OutputFormat::Svg {
            return Err(RenderError::UnsupportedFormat {
                method: NATIVE_METHOD.to_string(),
                format: options.format,
            });
        }
        let svg = self.draw(chart, dataset, options)?;
        Ok(Artifact {
            mime_type: OutputFormat::Svg.mime_type().to_string(),
            encoding: "base64".to_string(),
            content: STANDARD.encode(svg.as_bytes()),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Plot {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

struct Canvas<'a> {
    svg: String,
    plot: Plot,
    palette: Vec<&'a str>,
}

impl Canvas<'_> {
    fn color(&self, i: usize) -> &str {
        self.palette[i % self.palette.len()]
    }

    /// Value range that always includes zero.
    fn span(values: impl Iterator<Item = f64>) -> (f64, f64) {
        let (lo, hi) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if (hi - lo).abs() < f64::EPSILON {
            (lo, lo + 1.0)
        } else {
            (lo, hi)
        }
    }

    fn y_of(&self, v: f64, (lo, hi): (f64, f64)) -> f64 {
        self.plot.y + self.plot.h - (v - lo) / (hi - lo) * self.plot.h
    }

    fn x_label(&mut self, label: &str, x: f64) {
        let _ = write!(
            self.svg,
            r#"<text x="{x:.1}" y="{:.1}" text-anchor="middle" font-size="11" font-family="sans-serif">{}</text>"#,
            self.plot.y + self.plot.h + 16.0,
            escape(label)
        );
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: usize) {
        let fill = self.color(color).to_string();
        let _ = write!(
            self.svg,
            r#"<rect x="{x:.1}" y="{y:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
            w.max(0.0),
            h.max(0.0),
            escape(&fill)
        );
    }

    fn axes(&mut self, x_title: &str, y_title: &str) {
        let Plot { x, y, w, h } = self.plot;
        let _ = write!(
            self.svg,
            r##"<line x1="{x}" y1="{b}" x2="{r}" y2="{b}" stroke="#333"/><line x1="{x}" y1="{y}" x2="{x}" y2="{b}" stroke="#333"/><text x="{cx}" y="{ty}" text-anchor="middle" font-size="12" font-family="sans-serif">{xt}</text><text x="18" y="{cy}" text-anchor="middle" font-size="12" font-family="sans-serif" transform="rotate(-90 18 {cy})">{yt}</text>"##,
            b = y + h,
            r = x + w,
            cx = x + w / 2.0,
            ty = y + h + 40.0,
            cy = y + h / 2.0,
            xt = escape(x_title),
            yt = escape(y_title),
        );
    }

    fn vertical_bars(&mut self, dataset: &Dataset) {
        let span = Self::span(dataset.values.iter().copied());
        let band = self.plot.w / dataset.len() as f64;
        let zero = self.y_of(0.0, span);
        let show_labels = dataset.len() <= 24;
        for (i, (label, v)) in dataset.labels.iter().zip(&dataset.values).enumerate() {
            let x = self.plot.x + band * i as f64;
            let top = self.y_of(*v, span);
            self.rect(x + band * 0.1, top.min(zero), band * 0.8, (zero - top).abs(), 0);
            if show_labels {
                self.x_label(label, x + band / 2.0);
            }
        }
    }

    fn horizontal_bars(&mut self, dataset: &Dataset) {
        let (lo, hi) = Self::span(dataset.values.iter().copied());
        let band = self.plot.h / dataset.len() as f64;
        let x_of = |v: f64, plot: Plot| plot.x + (v - lo) / (hi - lo) * plot.w;
        let zero = x_of(0.0, self.plot);
        for (i, (label, v)) in dataset.labels.iter().zip(&dataset.values).enumerate() {
            let y = self.plot.y + band * i as f64;
            let end = x_of(*v, self.plot);
            self.rect(end.min(zero), y + band * 0.1, (end - zero).abs(), band * 0.8, i);
            let _ = write!(
                self.svg,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="11" font-family="sans-serif">{}</text>"#,
                self.plot.x - 4.0,
                y + band / 2.0 + 4.0,
                escape(label)
            );
        }
    }

    fn grouped_bars(&mut self, dataset: &Dataset) {
        let Some(series) = &dataset.series else {
            return self.vertical_bars(dataset);
        };
        let span = Self::span(series.values().flatten().map(|(_, v)| *v));
        let band = self.plot.w / dataset.len() as f64;
        let slot = band * 0.8 / series.len() as f64;
        let zero = self.y_of(0.0, span);
        for (s, points) in series.values().enumerate() {
            for (i, (_, v)) in points.iter().enumerate() {
                let x = self.plot.x + band * i as f64 + band * 0.1 + slot * s as f64;
                let top = self.y_of(*v, span);
                self.rect(x, top.min(zero), slot, (zero - top).abs(), s);
            }
        }
        for (i, label) in dataset.labels.iter().enumerate() {
            self.x_label(label, self.plot.x + band * (i as f64 + 0.5));
        }
    }

    fn stacked_bars(&mut self, dataset: &Dataset) {
        let Some(series) = &dataset.series else {
            return self.vertical_bars(dataset);
        };
        let span = Self::span(dataset.values.iter().copied());
        let band = self.plot.w / dataset.len() as f64;
        let mut base = vec![0.0; dataset.len()];
        for (s, points) in series.values().enumerate() {
            for (i, (_, v)) in points.iter().enumerate() {
                let bottom = self.y_of(base[i], span);
                let top = self.y_of(base[i] + v.max(0.0), span);
                self.rect(self.plot.x + band * i as f64 + band * 0.1, top, band * 0.8, bottom - top, s);
                base[i] += v.max(0.0);
            }
        }
        for (i, label) in dataset.labels.iter().enumerate() {
            self.x_label(label, self.plot.x + band * (i as f64 + 0.5));
        }
    }

    fn line_points(&self, values: &[f64], span: (f64, f64)) -> Vec<(f64, f64)> {
        let step = self.plot.w / (values.len().max(2) - 1) as f64;
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (self.plot.x + step * i as f64, self.y_of(*v, span)))
            .collect()
    }

    fn line(&mut self, values: &[f64], step: bool, fill: bool, color: usize) {
        let span = Self::span(values.iter().copied());
        let points = self.line_points(values, span);
        let mut path = String::new();
        for (i, (x, y)) in points.iter().enumerate() {
            if i == 0 {
                let _ = write!(path, "M{x:.1},{y:.1}");
            } else if step {
                let _ = write!(path, " H{x:.1} V{y:.1}");
            } else {
                let _ = write!(path, " L{x:.1},{y:.1}");
            }
        }
        let stroke = self.color(color).to_string();
        if fill {
            let zero = self.y_of(0.0, span);
            let (first_x, last_x) = (points[0].0, points[points.len() - 1].0);
            let _ = write!(
                self.svg,
                r#"<path d="{path} L{last_x:.1},{zero:.1} L{first_x:.1},{zero:.1} Z" fill="{c}" fill-opacity="0.35" stroke="{c}"/>"#,
                c = escape(&stroke)
            );
        } else {
            let _ = write!(self.svg, r#"<path d="{path}" fill="none" stroke="{}" stroke-width="2"/>"#, escape(&stroke));
        }
    }

    fn stacked_area(&mut self, dataset: &Dataset) {
        let Some(series) = &dataset.series else {
            return self.line(&dataset.values, false, true, 0);
        };
        let span = Self::span(dataset.values.iter().copied());
        let mut lower = vec![0.0; dataset.len()];
        for (s, points) in series.values().enumerate() {
            let upper: Vec<f64> = lower.iter().zip(points).map(|(b, (_, v))| b + v.max(0.0)).collect();
            let top = self.line_points(&upper, span);
            let bottom = self.line_points(&lower, span);
            let mut path = String::new();
            for (i, (x, y)) in top.iter().enumerate() {
                let _ = write!(path, "{}{x:.1},{y:.1}", if i == 0 { "M" } else { " L" });
            }
            for (x, y) in bottom.iter().rev() {
                let _ = write!(path, " L{x:.1},{y:.1}");
            }
            let fill = self.color(s).to_string();
            let _ = write!(self.svg, r#"<path d="{path} Z" fill="{}" fill-opacity="0.6"/>"#, escape(&fill));
            lower = upper;
        }
    }

    fn points(&mut self, dataset: &Dataset, sized: bool) {
        let span = Self::span(dataset.values.iter().copied());
        let max = dataset.values.iter().fold(f64::MIN_POSITIVE, |m, v| m.max(v.abs()));
        let coords = self.line_points(&dataset.values, span);
        let fill = self.color(0).to_string();
        for ((x, y), v) in coords.into_iter().zip(&dataset.values) {
            let r = if sized { 3.0 + 12.0 * v.abs() / max } else { 4.0 };
            let _ = write!(
                self.svg,
                r#"<circle cx="{x:.1}" cy="{y:.1}" r="{r:.1}" fill="{}" fill-opacity="0.7"/>"#,
                escape(&fill)
            );
        }
    }

    fn pie(&mut self, dataset: &Dataset) -> Result<(), String> {
        let total: f64 = dataset.values.iter().sum();
        if total <= 0.0 {
            return Err("pie values sum to zero".into());
        }
        let (cx, cy) = (self.plot.x + self.plot.w / 2.0, self.plot.y + self.plot.h / 2.0);
        let r = self.plot.w.min(self.plot.h) / 2.0;
        let mut angle = -std::f64::consts::FRAC_PI_2;
        for (i, (label, v)) in dataset.labels.iter().zip(&dataset.values).enumerate() {
            let sweep = v / total * std::f64::consts::TAU;
            let (x1, y1) = (cx + r * angle.cos(), cy + r * angle.sin());
            let mid = angle + sweep / 2.0;
            angle += sweep;
            let (x2, y2) = (cx + r * angle.cos(), cy + r * angle.sin());
            let large = u8::from(sweep > std::f64::consts::PI);
            let fill = self.color(i).to_string();
            let _ = write!(
                self.svg,
                r#"<path d="M{cx:.1},{cy:.1} L{x1:.1},{y1:.1} A{r:.1},{r:.1} 0 {large} 1 {x2:.1},{y2:.1} Z" fill="{}"/><text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="11" font-family="sans-serif">{}</text>"#,
                escape(&fill),
                cx + r * 1.1 * mid.cos(),
                cy + r * 1.1 * mid.sin(),
                escape(label)
            );
        }
        Ok(())
    }

    fn radar(&mut self, dataset: &Dataset) {
        let (cx, cy) = (self.plot.x + self.plot.w / 2.0, self.plot.y + self.plot.h / 2.0);
        let r = self.plot.w.min(self.plot.h) / 2.0;
        let max = dataset.values.iter().fold(f64::MIN_POSITIVE, |m, v| m.max(*v));
        let n = dataset.len() as f64;
        let mut polygon = String::new();
        for (i, (label, v)) in dataset.labels.iter().zip(&dataset.values).enumerate() {
            let angle = -std::f64::consts::FRAC_PI_2 + std::f64::consts::TAU * i as f64 / n;
            let k = (v / max).clamp(0.0, 1.0);
            let _ = write!(polygon, "{:.1},{:.1} ", cx + r * k * angle.cos(), cy + r * k * angle.sin());
            let _ = write!(
                self.svg,
                r##"<line x1="{cx:.1}" y1="{cy:.1}" x2="{:.1}" y2="{:.1}" stroke="#ccc"/><text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="11" font-family="sans-serif">{}</text>"##,
                cx + r * angle.cos(),
                cy + r * angle.sin(),
                cx + r * 1.1 * angle.cos(),
                cy + r * 1.1 * angle.sin(),
                escape(label)
            );
        }
        let fill = self.color(0).to_string();
        let _ = write!(
            self.svg,
            r#"<polygon points="{}" fill="{c}" fill-opacity="0.4" stroke="{c}"/>"#,
            polygon.trim_end(),
            c = escape(&fill)
        );
    }

    fn cells(&mut self, dataset: &Dataset) {
        let cols = (dataset.len() as f64).sqrt().ceil().max(1.0) as usize;
        let rows = dataset.len().div_ceil(cols);
        let (cw, ch) = (self.plot.w / cols as f64, self.plot.h / rows as f64);
        let (lo, hi) = dataset
            .values
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let range = (hi - lo).max(f64::EPSILON);
        let fill = self.color(0).to_string();
        for (i, v) in dataset.values.iter().enumerate() {
            let (x, y) = (self.plot.x + cw * (i % cols) as f64, self.plot.y + ch * (i / cols) as f64);
            let _ = write!(
                self.svg,
                r##"<rect x="{x:.1}" y="{y:.1}" width="{cw:.1}" height="{ch:.1}" fill="{}" fill-opacity="{:.2}" stroke="#fff"/>"##,
                escape(&fill),
                0.15 + 0.85 * (v - lo) / range
            );
        }
    }

    fn boxes(&mut self, dataset: &Dataset) {
        let mut sorted = dataset.values.clone();
        sorted.sort_by(f64::total_cmp);
        let span = Self::span(sorted.iter().copied());
        let [min, q1, median, q3, max] = [0.0, 0.25, 0.5, 0.75, 1.0].map(|q| quantile(&sorted, q));
        let cx = self.plot.x + self.plot.w / 2.0;
        let half = self.plot.w / 6.0;
        let (y_min, y_q1, y_med, y_q3, y_max) = (
            self.y_of(min, span),
            self.y_of(q1, span),
            self.y_of(median, span),
            self.y_of(q3, span),
            self.y_of(max, span),
        );
        let fill = self.color(0).to_string();
        let _ = write!(
            self.svg,
            r##"<line x1="{cx:.1}" y1="{y_min:.1}" x2="{cx:.1}" y2="{y_max:.1}" stroke="#333"/><rect x="{:.1}" y="{y_q3:.1}" width="{:.1}" height="{:.1}" fill="{}" fill-opacity="0.6" stroke="#333"/><line x1="{:.1}" y1="{y_med:.1}" x2="{:.1}" y2="{y_med:.1}" stroke="#000" stroke-width="2"/>"##,
            cx - half,
            half * 2.0,
            (y_q1 - y_q3).max(0.0),
            escape(&fill),
            cx - half,
            cx + half,
        );
    }
}

/// Linear-interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let (lo, hi) = (pos.floor() as usize, pos.ceil() as usize);
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
