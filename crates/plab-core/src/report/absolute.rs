//! Domain-by-algorithm tables, one per attribute.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde_json::Value;

use super::table::{Cell, Table, escape_html, escape_tex};
use super::{EvalProperties, Report, ReportFormat, RunProperties, format_number, numeric, text};

/// Values at or below zero would break the geometric mean.
const MIN_GEOMEAN_VALUE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub struct AbsoluteReport {
    pub format: ReportFormat,
    pub attributes: Vec<String>,
    /// Algorithms to show, in column order. Empty means all, sorted.
    pub algorithms: Vec<String>,
    pub error_attributes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregation {
    /// Plain sum over all runs, missing values count as 0.
    Coverage,
    /// Sum over tasks solved by every algorithm.
    Sum,
    /// Geometric mean over tasks solved by every algorithm.
    GeometricMean,
}

impl Aggregation {
    fn for_attribute(attribute: &str) -> Self {
        if attribute == "coverage" {
            Self::Coverage
        } else if attribute.ends_with("_time") {
            Self::GeometricMean
        } else {
            Self::Sum
        }
    }

    fn summary_label(self) -> &'static str {
        match self {
            Self::Coverage | Self::Sum => "Sum",
            Self::GeometricMean => "Geometric mean",
        }
    }

    fn apply(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            Self::Coverage | Self::Sum => Some(values.iter().sum()),
            Self::GeometricMean => {
                let log_sum: f64 = values.iter().map(|v| v.max(MIN_GEOMEAN_VALUE).ln()).sum();
                Some((log_sum / values.len() as f64).exp())
            }
        }
    }
}

/// problem -> algorithm -> run
type DomainRuns<'a> = BTreeMap<&'a str, BTreeMap<&'a str, &'a RunProperties>>;

impl AbsoluteReport {
    fn selected_algorithms(&self, properties: &EvalProperties) -> Vec<String> {
        if !self.algorithms.is_empty() {
            return self.algorithms.clone();
        }
        let all: BTreeSet<&str> = properties.values().filter_map(|r| text(r, "algorithm")).collect();
        all.into_iter().map(str::to_owned).collect()
    }

    fn attribute_table(
        &self,
        attribute: &str,
        algorithms: &[String],
        domains: &BTreeMap<&str, DomainRuns<'_>>,
    ) -> Table {
        let aggregation = Aggregation::for_attribute(attribute);
        let mut header = vec!["domain".to_owned()];
        header.extend(algorithms.iter().cloned());

        let mut rows = Vec::new();
        let mut summary_values: Vec<Vec<f64>> = vec![Vec::new(); algorithms.len()];
        let mut total_tasks = 0usize;

        for (domain, problems) in domains {
            total_tasks += problems.len();
            let per_algorithm = collect_values(attribute, aggregation, algorithms, problems);
            let cells: Vec<Option<f64>> =
                per_algorithm.iter().map(|v| aggregation.apply(v)).collect();
            for (summary, values) in summary_values.iter_mut().zip(per_algorithm) {
                summary.extend(values);
            }
            rows.push(value_row(
                format!("{domain} ({})", problems.len()),
                &cells,
                attribute,
            ));
        }

        let summary: Vec<Option<f64>> = summary_values
            .iter()
            .map(|v| match aggregation {
                // Domains without runs still contribute a zero.
                Aggregation::Coverage => Some(v.iter().sum()),
                _ => aggregation.apply(v),
            })
            .collect();
        rows.push(value_row(
            format!("{} ({total_tasks})", aggregation.summary_label()),
            &summary,
            attribute,
        ));

        Table {
            caption: attribute.to_owned(),
            header,
            rows,
        }
    }

    fn error_table(&self, runs: &[&RunProperties]) -> Option<Table> {
        let rows: Vec<Vec<Cell>> = runs
            .iter()
            .filter(|r| has_unexplained_errors(r))
            .map(|r| {
                self.error_attributes
                    .iter()
                    .map(|a| Cell::plain(display_value(r.get(a))))
                    .collect()
            })
            .collect();
        if rows.is_empty() {
            return None;
        }
        Some(Table {
            caption: "Unexplained errors".to_owned(),
            header: self.error_attributes.clone(),
            rows,
        })
    }
}

impl Report for AbsoluteReport {
    fn render(&self, properties: &EvalProperties) -> Result<String> {
        let algorithms = self.selected_algorithms(properties);
        let runs: Vec<&RunProperties> = properties
            .values()
            .filter(|r| {
                text(r, "algorithm").is_some_and(|a| algorithms.iter().any(|x| x == a))
            })
            .collect();

        let mut domains: BTreeMap<&str, DomainRuns<'_>> = BTreeMap::new();
        for run in runs.iter().copied() {
            let (Some(domain), Some(problem), Some(algorithm)) =
                (text(run, "domain"), text(run, "problem"), text(run, "algorithm"))
            else {
                continue;
            };
            domains
                .entry(domain)
                .or_default()
                .entry(problem)
                .or_default()
                .insert(algorithm, run);
        }

        let mut tables: Vec<Table> = self
            .attributes
            .iter()
            .map(|a| self.attribute_table(a, &algorithms, &domains))
            .collect();
        let errors = self.error_table(&runs);
        let has_errors = errors.is_some();
        tables.extend(errors);

        tracing::debug!(
            runs = runs.len(),
            algorithms = algorithms.len(),
            tables = tables.len(),
            "rendering absolute report"
        );
        Ok(match self.format {
            ReportFormat::Html => wrap_html(&algorithms, &tables, has_errors),
            ReportFormat::Tex => wrap_tex(&algorithms, &tables),
        })
    }
}

/// Per algorithm, the values that enter the domain aggregate.
fn collect_values(
    attribute: &str,
    aggregation: Aggregation,
    algorithms: &[String],
    problems: &BTreeMap<&str, BTreeMap<&str, &RunProperties>>,
) -> Vec<Vec<f64>> {
    let mut values = vec![Vec::new(); algorithms.len()];
    for runs in problems.values() {
        let row: Vec<Option<f64>> = algorithms
            .iter()
            .map(|alg| runs.get(alg.as_str()).and_then(|r| numeric(r, attribute)))
            .collect();
        match aggregation {
            Aggregation::Coverage => {
                for (v, cell) in values.iter_mut().zip(row) {
                    v.push(cell.unwrap_or(0.0));
                }
            }
            Aggregation::Sum | Aggregation::GeometricMean => {
                if row.iter().all(Option::is_some) {
                    for (v, cell) in values.iter_mut().zip(row) {
                        v.extend(cell);
                    }
                }
            }
        }
    }
    values
}

fn value_row(label: String, values: &[Option<f64>], attribute: &str) -> Vec<Cell> {
    let present = values.iter().flatten().copied();
    let best = if attribute == "coverage" {
        present.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    } else {
        present.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
    };
    let highlight = values.len() > 1;

    let mut row = vec![Cell::plain(label)];
    row.extend(values.iter().map(|v| match v {
        Some(v) => Cell {
            text: format_number(*v),
            bold: highlight && Some(*v) == best,
        },
        None => Cell::plain("-"),
    }));
    row
}

fn has_unexplained_errors(run: &RunProperties) -> bool {
    match run.get("unexplained_errors") {
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| display_value(Some(v)))
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
    }
}

fn wrap_html(algorithms: &[String], tables: &[Table], has_errors: bool) -> String {
    let mut out = String::from(
        "<html>\n<head><meta charset=\"utf-8\"><title>Absolute report</title></head>\n<body>\n<h1>Absolute report</h1>\n",
    );
    out.push_str(&format!(
        "<p>Algorithms: {}</p>\n",
        escape_html(&algorithms.join(", "))
    ));
    for table in tables {
        out.push_str(&table.render(ReportFormat::Html));
    }
    if !has_errors {
        out.push_str("<p>No unexplained errors.</p>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn wrap_tex(algorithms: &[String], tables: &[Table]) -> String {
    let mut out = String::from("\\documentclass{article}\n\\begin{document}\n");
    out.push_str(&format!(
        "Algorithms: {}\n\n",
        escape_tex(&algorithms.join(", "))
    ));
    for table in tables {
        out.push_str(&table.render(ReportFormat::Tex));
        out.push('\n');
    }
    out.push_str("\\end{document}\n");
    out
}
