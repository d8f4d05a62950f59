use chartforge_core::{ChartType, Dataset, RenderError};

/// Reject datasets a chart type cannot meaningfully draw.
pub fn check_shape(chart: ChartType, dataset: &Dataset) -> Result<(), RenderError> {
    use ChartType::*;

    let unsupported = |reason: String| Err(RenderError::UnsupportedShape { chart, reason });
    let n = dataset.len();

    if n == 0 {
        return unsupported("dataset is empty".into());
    }
    if dataset.labels.len() != n {
        return unsupported(format!("{} labels for {n} values", dataset.labels.len()));
    }

    match chart {
        PieChart => {
            if !(2..=12).contains(&n) {
                return unsupported(format!("needs 2 to 12 slices, got {n}"));
            }
            if dataset.values.iter().any(|v| *v < 0.0) {
                return unsupported("slices must be non-negative".into());
            }
        }
        GroupedBar | StackedBar | StackedAreaChart if dataset.series_count() == 0 => {
            return unsupported("needs named series".into());
        }
        ScatterPlot | BubbleChart | Hexbin | Heatmap if n < 2 => {
            return unsupported(format!("needs at least 2 points, got {n}"));
        }
        Histogram | BoxPlot | ViolinPlot if n < 5 => {
            return unsupported(format!("needs at least 5 values, got {n}"));
        }
        _ => {}
    }
    Ok(())
}
