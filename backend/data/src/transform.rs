//! Validation of user-supplied data into a [`Dataset`].

use std::collections::{BTreeMap, HashMap};

use chartforge_core::{ChartError, DataColumns, DataInput, DataRecord, Dataset, Provenance, SeriesPoints};

/// Validate user data and build a `Provenance::User` dataset.
pub fn dataset_from_input(input: &DataInput, max_points: usize) -> Result<Dataset, ChartError> {
    match input {
        DataInput::Records(records) => from_records(records, max_points),
        DataInput::Columns(columns) => from_columns(columns, max_points),
    }
}

fn from_columns(columns: &DataColumns, max_points: usize) -> Result<Dataset, ChartError> {
    if columns.labels.len() != columns.values.len() {
        return Err(ChartError::Data(format!(
            "{} labels but {} values",
            columns.labels.len(),
            columns.values.len()
        )));
    }
    check_size(columns.values.len(), max_points)?;
    for (label, value) in columns.labels.iter().zip(&columns.values) {
        check_point(label, *value)?;
    }
    Ok(Dataset::new(
        columns.labels.clone(),
        columns.values.clone(),
        Provenance::User,
    ))
}

fn from_records(records: &[DataRecord], max_points: usize) -> Result<Dataset, ChartError> {
    check_size(records.len(), max_points)?;
    for record in records {
        check_point(&record.label, record.value)?;
    }

    let tagged = records.iter().filter(|r| r.series.is_some()).count();
    if tagged == 0 {
        let labels = records.iter().map(|r| r.label.clone()).collect();
        let values = records.iter().map(|r| r.value).collect();
        return Ok(Dataset::new(labels, values, Provenance::User));
    }
    if tagged != records.len() {
        return Err(ChartError::Data(
            "either every record or no record may name a series".to_string(),
        ));
    }
    multi_series(records)
}

/// Labels form the shared domain in first-seen order; values are per-label totals.
fn multi_series(records: &[DataRecord]) -> Result<Dataset, ChartError> {
    let mut domain: Vec<String> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut series: BTreeMap<String, SeriesPoints> = BTreeMap::new();

    for record in records {
        if !position.contains_key(record.label.as_str()) {
            position.insert(&record.label, domain.len());
            domain.push(record.label.clone());
        }
        let name = record.series.clone().unwrap_or_default();
        let points = series.entry(name.clone()).or_default();
        if points.iter().any(|(label, _)| *label == record.label) {
            return Err(ChartError::Data(format!(
                "series '{name}' repeats label '{}'",
                record.label
            )));
        }
        points.push((record.label.clone(), record.value));
    }

    let mut totals = vec![0.0; domain.len()];
    for (name, points) in &series {
        if points.len() != domain.len() {
            return Err(ChartError::Data(format!(
                "series '{name}' covers {} of {} labels; all series must share one label domain",
                points.len(),
                domain.len()
            )));
        }
        for (label, value) in points {
            totals[position[label.as_str()]] += value;
        }
    }

    Ok(Dataset::new(domain, totals, Provenance::User).with_series(series))
}

fn check_size(len: usize, max_points: usize) -> Result<(), ChartError> {
    if len == 0 {
        return Err(ChartError::Data("dataset is empty".to_string()));
    }
    if len > max_points {
        return Err(ChartError::Data(format!(
            "dataset has {len} points; the limit is {max_points}"
        )));
    }
    Ok(())
}

fn check_point(label: &str, value: f64) -> Result<(), ChartError> {
    if label.trim().is_empty() {
        return Err(ChartError::Data("labels must not be blank".to_string()));
    }
    if !value.is_finite() {
        return Err(ChartError::Data(format!("value for '{label}' is not a finite number")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str, value: f64, series: Option<&str>) -> DataRecord {
        DataRecord {
            label: label.to_string(),
            value,
            series: series.map(str::to_string),
        }
    }

    #[test]
    fn quarterly_records_keep_order() {
        let input = DataInput::Records(vec![
            record("Q1", 45000.0, None),
            record("Q2", 52000.0, None),
            record("Q3", 48000.0, None),
            record("Q4", 61000.0, None),
        ]);
        let dataset = dataset_from_input(&input, 1000).unwrap();
        assert_eq!(dataset.labels, vec!["Q1", "Q2", "Q3", "Q4"]);
        assert_eq!(dataset.provenance, Provenance::User);
        assert_eq!(dataset.statistics.mean, 51500.0);
        assert_eq!(dataset.statistics.count, 4);
    }

    #[test]
    fn mismatched_columns_are_a_data_error() {
        let input = DataInput::Columns(DataColumns {
            labels: vec!["a".into(), "b".into()],
            values: vec![1.0],
        });
        assert!(matches!(dataset_from_input(&input, 10), Err(ChartError::Data(_))));
    }

    #[test]
    fn empty_oversized_and_non_finite_inputs_are_rejected() {
        assert!(dataset_from_input(&DataInput::Records(vec![]), 10).is_err());

        let many = (0..11).map(|i| record(&format!("p{i}"), 1.0, None)).collect();
        assert!(dataset_from_input(&DataInput::Records(many), 10).is_err());

        let nan = DataInput::Records(vec![record("a", f64::NAN, None)]);
        assert!(dataset_from_input(&nan, 10).is_err());
    }

    #[test]
    fn series_share_label_domain_and_totals() {
        let input = DataInput::Records(vec![
            record("Jan", 10.0, Some("North")),
            record("Feb", 12.0, Some("North")),
            record("Jan", 5.0, Some("South")),
            record("Feb", 7.0, Some("South")),
        ]);
        let dataset = dataset_from_input(&input, 100).unwrap();
        assert_eq!(dataset.labels, vec!["Jan", "Feb"]);
        assert_eq!(dataset.values, vec![15.0, 19.0]);
        assert_eq!(dataset.series_count(), 2);
    }

    #[test]
    fn ragged_series_are_rejected() {
        let input = DataInput::Records(vec![
            record("Jan", 10.0, Some("North")),
            record("Feb", 12.0, Some("North")),
            record("Jan", 5.0, Some("South")),
        ]);
        assert!(matches!(dataset_from_input(&input, 100), Err(ChartError::Data(_))));

        let mixed = DataInput::Records(vec![record("Jan", 1.0, Some("North")), record("Feb", 2.0, None)]);
        assert!(dataset_from_input(&mixed, 100).is_err());
    }
}
