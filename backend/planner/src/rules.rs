//! Deterministic chart selection keyed by lexical cues in the intent text.
//!
//! Rules are evaluated in order; the first rule with a matching cue wins.
//! The table always ends in a catch-all so evaluation never comes up empty.

use chartforge_core::{ChartFamily, ChartType};

/// One ordered entry of the rule table.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    /// Lowercase words or phrases. Single words also match simple plurals.
    pub cues: Vec<String>,
    pub primary: ChartType,
    pub secondary: Option<ChartType>,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        cues: &[&str],
        primary: ChartType,
        secondary: Option<ChartType>,
    ) -> Self {
        Self {
            name: name.into(),
            cues: cues.iter().map(|c| c.to_lowercase()).collect(),
            primary,
            secondary,
        }
    }

    fn matches(&self, intent: &NormalizedIntent) -> bool {
        self.cues.iter().any(|cue| intent.contains_cue(cue))
    }
}

/// The rule that fired for an intent.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub rule: String,
    pub primary: ChartType,
    pub secondary: Option<ChartType>,
}

#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<Rule>,
    fallback: ChartType,
}

impl Default for RuleTable {
    fn default() -> Self {
        use ChartType::*;
        let rules = vec![
            Rule::new(
                "distribution",
                &["distribution", "spread", "histogram", "frequency", "variance", "outlier", "dispersion"],
                Histogram,
                Some(BoxPlot),
            ),
            Rule::new(
                "composition",
                &["share", "percentage", "percent", "proportion", "composition", "breakdown", "split", "pie"],
                PieChart,
                Some(BarChartVertical),
            ),
            Rule::new(
                "correlation",
                &["correlation", "correlate", "relationship", "versus", "vs", "scatter"],
                ScatterPlot,
                Some(BubbleChart),
            ),
            Rule::new("funnel", &["funnel", "conversion", "drop off", "drop-off"], Funnel, Some(BarChartHorizontal)),
            Rule::new("heatmap", &["heatmap", "heat map", "intensity", "matrix", "by hour"], Heatmap, Some(BarChartVertical)),
            Rule::new("project", &["gantt", "project timeline", "schedule", "milestone"], Gantt, Some(BarChartHorizontal)),
            Rule::new("waterfall", &["waterfall", "cumulative effect", "bridge"], Waterfall, Some(BarChartVertical)),
            Rule::new("pareto", &["pareto", "root cause", "causes"], Pareto, Some(BarChartVertical)),
            Rule::new("radar", &["radar", "spider", "dimensions", "profile"], RadarChart, Some(BarChartVertical)),
            Rule::new(
                "temporal",
                &[
                    "over time", "trend", "timeline", "time series", "history", "historical", "growth",
                    "daily", "weekly", "monthly", "quarterly", "yearly", "annual", "month", "year", "week",
                ],
                LineChart,
                Some(AreaChart),
            ),
            Rule::new(
                "comparison",
                &["compare", "comparison", "ranking", "top", "across", "by region", "by product", "by department"],
                BarChartVertical,
                Some(BarChartHorizontal),
            ),
        ];
        Self::new(rules, BarChartVertical)
    }
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>, fallback: ChartType) -> Self {
        Self { rules, fallback }
    }

    pub fn fallback(&self) -> ChartType {
        self.fallback
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// First matching rule, or the catch-all.
    pub fn evaluate(&self, intent: &str) -> RuleMatch {
        let normalized = NormalizedIntent::new(intent);
        self.rules
            .iter()
            .find(|rule| rule.matches(&normalized))
            .map(|rule| RuleMatch {
                rule: rule.name.clone(),
                primary: rule.primary,
                secondary: rule.secondary.or_else(|| Some(companion(rule.primary))),
            })
            .unwrap_or_else(|| RuleMatch {
                rule: "default".to_string(),
                primary: self.fallback,
                secondary: Some(companion(self.fallback)),
            })
    }
}

/// A chart of a neighbouring kind to retry with when `chart` cannot be drawn.
pub fn companion(chart: ChartType) -> ChartType {
    use ChartType::*;
    match chart.family() {
        ChartFamily::Trend if chart == LineChart => BarChartVertical,
        ChartFamily::Trend => LineChart,
        ChartFamily::Comparison if chart == BarChartVertical => BarChartHorizontal,
        ChartFamily::Distribution if chart == Histogram => BoxPlot,
        ChartFamily::Distribution => Histogram,
        ChartFamily::Correlation if chart == ScatterPlot => LineChart,
        ChartFamily::Correlation => ScatterPlot,
        ChartFamily::Statistical if chart == ControlChart => LineChart,
        _ => BarChartVertical,
    }
}

/// Lowercased intent split into alphanumeric words.
struct NormalizedIntent {
    words: Vec<String>,
    joined: String,
}

impl NormalizedIntent {
    fn new(intent: &str) -> Self {
        let words: Vec<String> = intent
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        let joined = format!(" {} ", words.join(" "));
        Self { words, joined }
    }

    fn contains_cue(&self, cue: &str) -> bool {
        let cue_words: Vec<&str> = cue
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        match cue_words.as_slice() {
            [] => false,
            [word] => self.words.iter().any(|w| {
                w == word
                    || w.strip_suffix('s').is_some_and(|stem| stem == *word)
                    || w.strip_suffix("es").is_some_and(|stem| stem == *word)
            }),
            phrase => self.joined.contains(&format!(" {} ", phrase.join(" "))),
        }
    }
}
