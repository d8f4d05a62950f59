//! `chartforge chart-types`: the supported chart catalogue, grouped by family.

use chartforge_core::{ChartFamily, ChartType};

use crate::output::{render_table, supports_color, BOLD, RESET};

pub fn catalogue_rows(family: ChartFamily) -> Vec<Vec<String>> {
    family
        .members()
        .map(|t: ChartType| {
            vec![
                t.as_str().to_string(),
                t.display_name().to_string(),
                t.description().to_string(),
            ]
        })
        .collect()
}

pub fn run() {
    for family in ChartFamily::ALL {
        let title = family.display_name();
        if supports_color() {
            println!("\n{BOLD}{title}{RESET}");
        } else {
            println!("\n{title}");
        }
        print!("{}", render_table(&["id", "name", "description"], &catalogue_rows(family)));
    }
    println!("\n{} chart types", ChartType::ALL.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_chart_appears_once() {
        let total: usize = ChartFamily::ALL.iter().map(|f| catalogue_rows(*f).len()).sum();
        assert_eq!(total, ChartType::ALL.len());
    }

    #[test]
    fn trend_rows_start_with_line_chart() {
        let rows = catalogue_rows(ChartFamily::Trend);
        assert_eq!(rows[0][0], "line_chart");
    }
}
