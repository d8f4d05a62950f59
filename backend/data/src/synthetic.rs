//! Synthetic dataset generation shaped by chart type and intent wording.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::Rng;

use chartforge_core::{ChartFamily, ChartType, Dataset, Provenance, SeriesPoints};

/// The four value-shape generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generator {
    Trend,
    Seasonal,
    /// Normal draw around the base value.
    RandomNormal,
    /// Uniform draw around the base value.
    RandomUniform,
    Mixed,
}

impl Generator {
    /// Pick a generator from the chart family and periodic wording in the intent.
    pub fn choose(chart: ChartType, intent: &Cues) -> Self {
        if chart.is_temporal() {
            return if intent.periodic { Generator::Seasonal } else { Generator::Trend };
        }
        match chart.family() {
            ChartFamily::Distribution => Generator::RandomNormal,
            ChartFamily::Correlation | ChartFamily::MultiDimensional => Generator::Mixed,
            _ => Generator::RandomUniform,
        }
    }
}

/// Magnitude of generated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueScale {
    Currency,
    Percentage,
    Count,
}

impl ValueScale {
    fn base(self) -> f64 {
        match self {
            ValueScale::Currency => 50_000.0,
            ValueScale::Percentage => 50.0,
            ValueScale::Count => 100.0,
        }
    }
}

/// Label vocabulary for synthetic points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelDomain {
    Months,
    Quarters,
    Weeks,
    Days,
    Years,
    Stages,
    Tasks,
    Samples,
    Categories,
}

impl LabelDomain {
    /// Placeholder vocabularies worth rewriting with the advisor.
    pub fn is_generic(self) -> bool {
        matches!(self, LabelDomain::Categories | LabelDomain::Samples)
    }

    fn choose(chart: ChartType, cues: &Cues) -> Self {
        match chart {
            ChartType::Funnel => return LabelDomain::Stages,
            ChartType::Gantt => return LabelDomain::Tasks,
            _ => {}
        }
        if chart.is_temporal() && chart != ChartType::ControlChart {
            return cues.period.unwrap_or(LabelDomain::Months);
        }
        match chart.family() {
            ChartFamily::Distribution | ChartFamily::Correlation => LabelDomain::Samples,
            ChartFamily::Statistical if chart == ChartType::ControlChart => LabelDomain::Samples,
            _ => LabelDomain::Categories,
        }
    }

    fn labels(self, n: usize) -> Vec<String> {
        const MONTHS: [&str; 12] = [
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ];
        const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
        const STAGES: [&str; 6] = ["Visitors", "Leads", "Qualified", "Proposals", "Negotiation", "Closed"];

        (0..n)
            .map(|i| match self {
                LabelDomain::Months if n <= 12 => MONTHS[i].to_string(),
                LabelDomain::Months => format!("{} Y{}", MONTHS[i % 12], i / 12 + 1),
                LabelDomain::Quarters => format!("Q{} Y{}", i % 4 + 1, i / 4 + 1),
                LabelDomain::Weeks => format!("Week {}", i + 1),
                LabelDomain::Days if n <= 7 => DAYS[i].to_string(),
                LabelDomain::Days => format!("Day {}", i + 1),
                LabelDomain::Years => format!("Year {}", i + 1),
                LabelDomain::Stages => STAGES.get(i).map_or_else(|| format!("Stage {}", i + 1), |s| s.to_string()),
                LabelDomain::Tasks => format!("Task {}", i + 1),
                LabelDomain::Samples => format!("Sample {}", i + 1),
                LabelDomain::Categories if i < 26 => format!("Category {}", (b'A' + i as u8) as char),
                LabelDomain::Categories => format!("Category {}", i + 1),
            })
            .collect()
    }

    /// Cycle length used by the seasonal generator.
    fn period(self) -> f64 {
        match self {
            LabelDomain::Quarters => 4.0,
            LabelDomain::Days => 7.0,
            LabelDomain::Weeks => 13.0,
            _ => 12.0,
        }
    }
}

/// Wording signals extracted once from the intent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cues {
    pub periodic: bool,
    pub declining: bool,
    pub period: Option<LabelDomain>,
    pub scale: Option<ValueScale>,
}

impl Cues {
    pub fn from_intent(intent: &str) -> Self {
        let lower = intent.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '%' && c != '$')
            .filter(|w| !w.is_empty())
            .collect();
        let has = |options: &[&str]| words.iter().any(|w| options.iter().any(|o| w.starts_with(o)));

        let period = if has(&["quarter"]) {
            Some(LabelDomain::Quarters)
        } else if has(&["week"]) {
            Some(LabelDomain::Weeks)
        } else if has(&["daily", "day"]) {
            Some(LabelDomain::Days)
        } else if has(&["month"]) {
            Some(LabelDomain::Months)
        } else if has(&["year", "annual"]) {
            Some(LabelDomain::Years)
        } else {
            None
        };

        let scale = if has(&["percent", "%", "rate", "ratio", "share"]) {
            Some(ValueScale::Percentage)
        } else if has(&["sales", "revenue", "profit", "cost", "price", "income", "budget", "spend", "$"]) {
            Some(ValueScale::Currency)
        } else {
            None
        };

        Self {
            periodic: has(&["monthly", "weekly", "daily", "seasonal", "season", "quarterly"]),
            declining: has(&["declin", "decreas", "drop", "fall", "shrink"]),
            period,
            scale,
        }
    }
}

/// Output of one synthesis run.
#[derive(Debug, Clone)]
pub struct Synthesized {
    pub dataset: Dataset,
    pub domain: LabelDomain,
    pub generator: Generator,
}

const SERIES_NAMES: [&str; 3] = ["Series A", "Series B", "Series C"];

/// Generate a dataset appropriate for `chart`, drawing from `rng`.
pub fn synthesize(chart: ChartType, intent: &str, rng: &mut StdRng) -> Synthesized {
    let cues = Cues::from_intent(intent);
    let generator = Generator::choose(chart, &cues);
    let domain = LabelDomain::choose(chart, &cues);
    let scale = cues.scale.unwrap_or(ValueScale::Count);

    let range = chart.point_range();
    let n = rng.gen_range(*range.start()..=*range.end());
    let labels = domain.labels(n);

    let shape = Shape { generator, scale, domain, declining: cues.declining, chart };

    let dataset = if chart.requires_series() {
        let mut series: BTreeMap<String, SeriesPoints> = BTreeMap::new();
        let mut totals = vec![0.0; n];
        for (k, name) in SERIES_NAMES.iter().enumerate() {
            let factor = 1.0 - 0.2 * k as f64;
            let values = shape.values(n, rng);
            let points: SeriesPoints = labels
                .iter()
                .zip(values)
                .map(|(label, v)| (label.clone(), round2(v * factor)))
                .collect();
            for (total, (_, v)) in totals.iter_mut().zip(&points) {
                *total += v;
            }
            series.insert(name.to_string(), points);
        }
        let totals = totals.into_iter().map(round2).collect();
        Dataset::new(labels, totals, Provenance::Synthetic).with_series(series)
    } else {
        let values = shape.values(n, rng).into_iter().map(round2).collect();
        Dataset::new(labels, values, Provenance::Synthetic)
    };

    Synthesized { dataset, domain, generator }
}

struct Shape {
    generator: Generator,
    scale: ValueScale,
    domain: LabelDomain,
    declining: bool,
    chart: ChartType,
}

impl Shape {
    fn values(&self, n: usize, rng: &mut StdRng) -> Vec<f64> {
        let base = self.scale.base();
        let mut values: Vec<f64> = match self.generator {
            Generator::Trend => {
                let slope = rng.gen_range(0.03..0.08) * if self.declining { -1.0 } else { 1.0 };
                (0..n)
                    .map(|i| base * (1.0 + slope * i as f64) * rng.gen_range(0.98..1.02))
                    .collect()
            }
            Generator::Seasonal => {
                let period = self.domain.period();
                let phase = rng.gen_range(0.0..(2.0 * PI));
                (0..n)
                    .map(|i| {
                        let season = 1.0 + 0.2 * ((2.0 * PI * i as f64 / period) + phase).sin();
                        base * season * (1.0 + 0.01 * i as f64) * rng.gen_range(0.97..1.03)
                    })
                    .collect()
            }
            Generator::RandomNormal => (0..n).map(|_| base + base * 0.15 * standard_normal(rng)).collect(),
            Generator::RandomUniform => (0..n).map(|_| base * rng.gen_range(0.5..1.5)).collect(),
            Generator::Mixed => {
                let slope = rng.gen_range(0.01..0.05);
                (0..n)
                    .map(|i| base * (1.0 + slope * i as f64) + base * rng.gen_range(-0.2..0.2))
                    .collect()
            }
        };

        if self.scale == ValueScale::Percentage {
            values.iter_mut().for_each(|v| *v = v.clamp(0.0, 100.0));
        }
        if self.chart.family() == ChartFamily::Composition {
            values.iter_mut().for_each(|v| *v = v.max(0.0));
        }
        if matches!(self.chart, ChartType::Funnel | ChartType::Pareto) {
            values.sort_by(|a, b| b.total_cmp(a));
        }
        values
    }
}

/// Box-Muller transform over two uniform draws.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn lengths_agree_for_every_chart_type() {
        let mut rng = rng();
        for chart in ChartType::ALL {
            let out = synthesize(chart, "show something", &mut rng);
            let d = &out.dataset;
            assert_eq!(d.labels.len(), d.values.len(), "{chart}");
            assert_eq!(d.values.len(), d.statistics.count, "{chart}");
            assert!(chart.point_range().contains(&d.len()), "{chart}");
            assert_eq!(d.provenance, Provenance::Synthetic);
            assert_eq!(chart.requires_series(), d.series.is_some(), "{chart}");
        }
    }

    #[test]
    fn monthly_intent_gets_seasonal_month_labels() {
        let out = synthesize(ChartType::LineChart, "Show monthly sales for 2024", &mut rng());
        assert_eq!(out.generator, Generator::Seasonal);
        assert_eq!(out.domain, LabelDomain::Months);
        assert_eq!(out.dataset.labels[0], "Jan");
        assert!(out.dataset.statistics.mean > 10_000.0);
    }

    #[test]
    fn generator_follows_family() {
        let plain = Cues::from_intent("revenue");
        assert_eq!(Generator::choose(ChartType::AreaChart, &plain), Generator::Trend);
        assert_eq!(Generator::choose(ChartType::Histogram, &plain), Generator::RandomNormal);
        assert_eq!(Generator::choose(ChartType::ScatterPlot, &plain), Generator::Mixed);
        assert_eq!(Generator::choose(ChartType::Heatmap, &plain), Generator::Mixed);
        assert_eq!(Generator::choose(ChartType::PieChart, &plain), Generator::RandomUniform);
    }

    #[test]
    fn composition_and_percentages_stay_in_range() {
        let mut rng = rng();
        for _ in 0..20 {
            let out = synthesize(ChartType::PieChart, "market share percentage", &mut rng);
            assert!((3..=8).contains(&out.dataset.len()));
            assert!(out.dataset.values.iter().all(|v| (0.0..=100.0).contains(v)));
        }
    }

    #[test]
    fn histogram_has_at_least_thirty_points() {
        let out = synthesize(ChartType::Histogram, "distribution of order sizes", &mut rng());
        assert!(out.dataset.len() >= 30);
        assert_eq!(out.domain, LabelDomain::Samples);
    }

    #[test]
    fn funnel_stages_descend() {
        let out = synthesize(ChartType::Funnel, "signup funnel", &mut rng());
        assert_eq!(out.dataset.labels[0], "Visitors");
        assert!(out.dataset.values.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn same_seed_same_dataset() {
        let a = synthesize(ChartType::BarChartVertical, "sales by region", &mut StdRng::seed_from_u64(42));
        let b = synthesize(ChartType::BarChartVertical, "sales by region", &mut StdRng::seed_from_u64(42));
        assert_eq!(a.dataset, b.dataset);
    }

    #[test]
    fn declining_trend_decreases() {
        let out = synthesize(ChartType::LineChart, "declining revenue over the years", &mut rng());
        assert_eq!(out.generator, Generator::Trend);
        assert_eq!(out.dataset.statistics.trend, Some(chartforge_core::Trend::Decreasing));
    }
}
