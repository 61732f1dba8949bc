//! Pairwise scatter plots rendered as standalone pgfplots documents.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{Result, bail};

use super::filter::{Category, PropertyFilter, passes_all};
use super::table::escape_tex;
use super::{EvalProperties, Report, RunProperties, numeric, text};

/// Log axes cannot show values at or below zero.
const MIN_PLOT_VALUE: f64 = 0.01;

/// Factor applied to the largest value to place missing values.
const MISSING_FACTOR: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPlotReport {
    pub attribute: String,
    /// `[x, y]` algorithms.
    pub algorithms: Vec<String>,
    pub category: Category,
    pub filters: Vec<PropertyFilter>,
}

/// A plotted task; `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: Option<f64>,
    y: Option<f64>,
}

impl ScatterPlotReport {
    /// Points per category for tasks run by both algorithms.
    fn collect_points(&self, properties: &EvalProperties) -> Result<BTreeMap<String, Vec<Point>>> {
        let [x_alg, y_alg] = self.algorithms.as_slice() else {
            bail!(
                "scatter plot of {} needs exactly two algorithms, got {}",
                self.attribute,
                self.algorithms.len()
            );
        };

        // (domain, problem) -> (x run, y run)
        type Pair<'a> = (Option<&'a RunProperties>, Option<&'a RunProperties>);
        let mut tasks: BTreeMap<(&str, &str), Pair<'_>> = BTreeMap::new();
        for run in properties.values().filter(|r| passes_all(&self.filters, r)) {
            let (Some(domain), Some(problem), Some(algorithm)) =
                (text(run, "domain"), text(run, "problem"), text(run, "algorithm"))
            else {
                continue;
            };
            let entry = tasks.entry((domain, problem)).or_default();
            if algorithm == x_alg.as_str() {
                entry.0 = Some(run);
            } else if algorithm == y_alg.as_str() {
                entry.1 = Some(run);
            }
        }

        let mut points: BTreeMap<String, Vec<Point>> = BTreeMap::new();
        for (x_run, y_run) in tasks.into_values() {
            let (Some(x_run), Some(y_run)) = (x_run, y_run) else {
                continue;
            };
            points.entry(self.category.of(x_run)).or_default().push(Point {
                x: numeric(x_run, &self.attribute),
                y: numeric(y_run, &self.attribute),
            });
        }
        Ok(points)
    }
}

impl Report for ScatterPlotReport {
    fn render(&self, properties: &EvalProperties) -> Result<String> {
        let points = self.collect_points(properties)?;
        let (x_alg, y_alg) = (&self.algorithms[0], &self.algorithms[1]);

        let max_value = points
            .values()
            .flatten()
            .flat_map(|p| [p.x, p.y])
            .flatten()
            .fold(MIN_PLOT_VALUE, f64::max);
        let missing = max_value * MISSING_FACTOR;
        let place = |v: Option<f64>| v.map_or(missing, |v| v.max(MIN_PLOT_VALUE));

        let mut out = String::new();
        out.push_str("\\documentclass[tikz]{standalone}\n");
        out.push_str("\\usepackage{pgfplots}\n");
        out.push_str("\\pgfplotsset{compat=1.16}\n");
        out.push_str("\\begin{document}\n\\begin{tikzpicture}\n");
        let _ = writeln!(
            out,
            "\\begin{{axis}}[xmode=log, ymode=log, title={{{}}}, xlabel={{{}}}, ylabel={{{}}}, \
             xmin={MIN_PLOT_VALUE}, ymin={MIN_PLOT_VALUE}, xmax={missing}, ymax={missing}, \
             legend pos=outer north east]",
            escape_tex(&self.attribute),
            escape_tex(x_alg),
            escape_tex(y_alg),
        );
        for (category, pts) in &points {
            out.push_str("\\addplot[only marks, mark=x] coordinates {\n");
            for p in pts {
                let _ = writeln!(out, "  ({}, {})", place(p.x), place(p.y));
            }
            out.push_str("};\n");
            let _ = writeln!(out, "\\addlegendentry{{{}}}", escape_tex(category));
        }
        let _ = writeln!(
            out,
            "\\addplot[gray, dashed, forget plot] coordinates {{({MIN_PLOT_VALUE}, {MIN_PLOT_VALUE}) ({missing}, {missing})}};"
        );
        out.push_str("\\end{axis}\n\\end{tikzpicture}\n\\end{document}\n");

        tracing::debug!(
            attribute = %self.attribute,
            categories = points.len(),
            points = points.values().map(Vec::len).sum::<usize>(),
            "rendering scatter plot"
        );
        Ok(out)
    }
}
