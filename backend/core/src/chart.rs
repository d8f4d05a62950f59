use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every chart type the pipeline knows how to plan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    LineChart,
    StepChart,
    AreaChart,
    StackedAreaChart,
    BarChartVertical,
    BarChartHorizontal,
    GroupedBar,
    StackedBar,
    Histogram,
    BoxPlot,
    ViolinPlot,
    ScatterPlot,
    BubbleChart,
    Hexbin,
    PieChart,
    Waterfall,
    Funnel,
    RadarChart,
    Heatmap,
    ErrorBar,
    ControlChart,
    Pareto,
    Gantt,
}

/// Grouping used by rule matching, synthesis and the `/chart-types` listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartFamily {
    Trend,
    Comparison,
    Distribution,
    Correlation,
    Composition,
    MultiDimensional,
    Statistical,
    Project,
}

/// Default axis captions for a chart type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisLabels {
    pub x: &'static str,
    pub y: &'static str,
}

impl ChartType {
    pub const ALL: [ChartType; 23] = [
        ChartType::LineChart,
        ChartType::StepChart,
        ChartType::AreaChart,
        ChartType::StackedAreaChart,
        ChartType::BarChartVertical,
        ChartType::BarChartHorizontal,
        ChartType::GroupedBar,
        ChartType::StackedBar,
        ChartType::Histogram,
        ChartType::BoxPlot,
        ChartType::ViolinPlot,
        ChartType::ScatterPlot,
        ChartType::BubbleChart,
        ChartType::Hexbin,
        ChartType::PieChart,
        ChartType::Waterfall,
        ChartType::Funnel,
        ChartType::RadarChart,
        ChartType::Heatmap,
        ChartType::ErrorBar,
        ChartType::ControlChart,
        ChartType::Pareto,
        ChartType::Gantt,
    ];

    pub fn family(self) -> ChartFamily {
        use ChartType::*;
        match self {
            LineChart | StepChart | AreaChart | StackedAreaChart => ChartFamily::Trend,
            BarChartVertical | BarChartHorizontal | GroupedBar | StackedBar => {
                ChartFamily::Comparison
            }
            Histogram | BoxPlot | ViolinPlot => ChartFamily::Distribution,
            ScatterPlot | BubbleChart | Hexbin => ChartFamily::Correlation,
            PieChart | Waterfall | Funnel => ChartFamily::Composition,
            RadarChart | Heatmap => ChartFamily::MultiDimensional,
            ErrorBar | ControlChart | Pareto => ChartFamily::Statistical,
            Gantt => ChartFamily::Project,
        }
    }

    /// Charts whose x-axis is ordered in time.
    pub fn is_temporal(self) -> bool {
        self.family() == ChartFamily::Trend || self == ChartType::ControlChart
    }

    /// Charts that cannot be drawn without named series.
    pub fn requires_series(self) -> bool {
        matches!(
            self,
            ChartType::GroupedBar | ChartType::StackedBar | ChartType::StackedAreaChart
        )
    }

    pub fn as_str(self) -> &'static str {
        use ChartType::*;
        match self {
            LineChart => "line_chart",
            StepChart => "step_chart",
            AreaChart => "area_chart",
            StackedAreaChart => "stacked_area_chart",
            BarChartVertical => "bar_chart_vertical",
            BarChartHorizontal => "bar_chart_horizontal",
            GroupedBar => "grouped_bar",
            StackedBar => "stacked_bar",
            Histogram => "histogram",
            BoxPlot => "box_plot",
            ViolinPlot => "violin_plot",
            ScatterPlot => "scatter_plot",
            BubbleChart => "bubble_chart",
            Hexbin => "hexbin",
            PieChart => "pie_chart",
            Waterfall => "waterfall",
            Funnel => "funnel",
            RadarChart => "radar_chart",
            Heatmap => "heatmap",
            ErrorBar => "error_bar",
            ControlChart => "control_chart",
            Pareto => "pareto",
            Gantt => "gantt",
        }
    }

    pub fn display_name(self) -> &'static str {
        use ChartType::*;
        match self {
            LineChart => "Line Chart",
            StepChart => "Step Chart",
            AreaChart => "Area Chart",
            StackedAreaChart => "Stacked Area Chart",
            BarChartVertical => "Vertical Bar Chart",
            BarChartHorizontal => "Horizontal Bar Chart",
            GroupedBar => "Grouped Bar Chart",
            StackedBar => "Stacked Bar Chart",
            Histogram => "Histogram",
            BoxPlot => "Box Plot",
            ViolinPlot => "Violin Plot",
            ScatterPlot => "Scatter Plot",
            BubbleChart => "Bubble Chart",
            Hexbin => "Hexbin Plot",
            PieChart => "Pie Chart",
            Waterfall => "Waterfall Chart",
            Funnel => "Funnel Chart",
            RadarChart => "Radar Chart",
            Heatmap => "Heatmap",
            ErrorBar => "Error Bar Chart",
            ControlChart => "Control Chart",
            Pareto => "Pareto Chart",
            Gantt => "Gantt Chart",
        }
    }

    pub fn description(self) -> &'static str {
        use ChartType::*;
        match self {
            LineChart => "Shows trends and changes over time",
            StepChart => "Shows discrete changes at specific points",
            AreaChart => "Shows volume changes over time",
            StackedAreaChart => "Shows composition changes over time",
            BarChartVertical => "Compares values across categories",
            BarChartHorizontal => "Compares values with long category names",
            GroupedBar => "Compares multiple series across categories",
            StackedBar => "Shows composition within categories",
            Histogram => "Shows distribution of continuous data",
            BoxPlot => "Shows statistical distribution and outliers",
            ViolinPlot => "Shows distribution shape and density",
            ScatterPlot => "Shows correlation between two variables",
            BubbleChart => "Shows three-dimensional relationships",
            Hexbin => "Shows density in scatter plot data",
            PieChart => "Shows proportions of a whole",
            Waterfall => "Shows cumulative effect of changes",
            Funnel => "Shows progressive reduction through stages",
            RadarChart => "Compares multiple dimensions",
            Heatmap => "Shows intensity across two dimensions",
            ErrorBar => "Shows variability and confidence intervals",
            ControlChart => "Monitors process stability over time",
            Pareto => "Shows the most significant factors",
            Gantt => "Shows project timeline and dependencies",
        }
    }

    pub fn axis_labels(self) -> AxisLabels {
        use ChartType::*;
        let (x, y) = match self {
            LineChart | AreaChart | StackedAreaChart => ("Period", "Value"),
            StepChart => ("Time", "Value"),
            BarChartVertical | GroupedBar | StackedBar => ("Category", "Value"),
            BarChartHorizontal => ("Value", "Category"),
            Histogram => ("Value", "Frequency"),
            BoxPlot | ViolinPlot => ("Category", "Distribution"),
            ScatterPlot | BubbleChart | Hexbin => ("X Value", "Y Value"),
            PieChart => ("Category", "Percentage"),
            Waterfall => ("Stage", "Change"),
            Funnel => ("Stage", "Value"),
            RadarChart => ("Dimension", "Value"),
            Heatmap => ("X Category", "Y Category"),
            ErrorBar => ("Condition", "Measurement"),
            ControlChart => ("Sample", "Value"),
            Pareto => ("Cause", "Frequency"),
            Gantt => ("Task", "Timeline"),
        };
        AxisLabels { x, y }
    }

    /// Number of data points a synthesized dataset for this chart should have.
    pub fn point_range(self) -> RangeInclusive<usize> {
        use ChartType::*;
        match self {
            Histogram | BoxPlot | ViolinPlot => 30..=60,
            ScatterPlot | BubbleChart | Hexbin => 20..=40,
            PieChart => 3..=8,
            Funnel => 4..=6,
            Waterfall | Pareto => 5..=8,
            RadarChart => 5..=8,
            Heatmap => 12..=24,
            Gantt => 4..=8,
            ControlChart => 20..=30,
            LineChart | StepChart | AreaChart | StackedAreaChart => 6..=12,
            BarChartVertical | BarChartHorizontal | GroupedBar | StackedBar | ErrorBar => 4..=8,
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known chart type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chart type '{0}'")]
pub struct UnknownChartType(pub String);

impl FromStr for ChartType {
    type Err = UnknownChartType;

    /// Accepts the canonical snake_case id, case-insensitively, with `-` or
    /// spaces in place of underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        ChartType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownChartType(s.to_string()))
    }
}

impl ChartFamily {
    pub const ALL: [ChartFamily; 8] = [
        ChartFamily::Trend,
        ChartFamily::Comparison,
        ChartFamily::Distribution,
        ChartFamily::Correlation,
        ChartFamily::Composition,
        ChartFamily::MultiDimensional,
        ChartFamily::Statistical,
        ChartFamily::Project,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            ChartFamily::Trend => "Line and Trend",
            ChartFamily::Comparison => "Bar Charts",
            ChartFamily::Distribution => "Distribution",
            ChartFamily::Correlation => "Correlation",
            ChartFamily::Composition => "Composition",
            ChartFamily::MultiDimensional => "Comparison",
            ChartFamily::Statistical => "Statistical",
            ChartFamily::Project => "Project",
        }
    }

    pub fn members(self) -> impl Iterator<Item = ChartType> {
        ChartType::ALL.into_iter().filter(move |t| t.family() == self)
    }
}
