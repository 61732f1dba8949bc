//! Minimal table model shared by the HTML and TeX renderers.

use std::fmt::Write as _;

use super::ReportFormat;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub text: String,
    pub bold: bool,
}

impl Cell {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub caption: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Html => self.to_html(),
            ReportFormat::Tex => self.to_tex(),
        }
    }

    fn to_html(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<h2>{}</h2>", escape_html(&self.caption));
        out.push_str("<table>\n<tr>");
        for h in &self.header {
            let _ = write!(out, "<th>{}</th>", escape_html(h));
        }
        out.push_str("</tr>\n");
        for row in &self.rows {
            out.push_str("<tr>");
            for cell in row {
                let text = escape_html(&cell.text);
                if cell.bold {
                    let _ = write!(out, "<td><b>{text}</b></td>");
                } else {
                    let _ = write!(out, "<td>{text}</td>");
                }
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</table>\n");
        out
    }

    fn to_tex(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\\section*{{{}}}", escape_tex(&self.caption));
        let spec = if self.header.is_empty() {
            String::new()
        } else {
            format!("l|{}", "r".repeat(self.header.len() - 1))
        };
        let _ = writeln!(out, "\\begin{{tabular}}{{{spec}}}");
        let header: Vec<String> = self.header.iter().map(|h| escape_tex(h)).collect();
        let _ = writeln!(out, "{} \\\\ \\hline", header.join(" & "));
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|c| {
                    let text = escape_tex(&c.text);
                    if c.bold { format!("\\textbf{{{text}}}") } else { text }
                })
                .collect();
            let _ = writeln!(out, "{} \\\\", cells.join(" & "));
        }
        out.push_str("\\end{tabular}\n");
        out
    }
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn escape_tex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '_' | '&' | '%' | '$' | '#' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table {
            caption: "search_time".to_owned(),
            header: vec!["domain".to_owned(), "a".to_owned(), "b".to_owned()],
            rows: vec![vec![
                Cell::plain("blocks"),
                Cell {
                    text: "1.00".to_owned(),
                    bold: true,
                },
                Cell::plain("2.00"),
            ]],
        }
    }

    #[test]
    fn html_marks_bold_cells() {
        let html = table().render(ReportFormat::Html);
        assert!(html.contains("<h2>search_time</h2>"));
        assert!(html.contains("<th>domain</th><th>a</th><th>b</th>"));
        assert!(html.contains("<td>blocks</td><td><b>1.00</b></td><td>2.00</td>"));
    }

    #[test]
    fn tex_escapes_and_bolds() {
        let tex = table().render(ReportFormat::Tex);
        assert!(tex.contains("\\section*{search\\_time}"));
        assert!(tex.contains("\\begin{tabular}{l|rr}"));
        assert!(tex.contains("blocks & \\textbf{1.00} & 2.00 \\\\"));
    }

    #[test]
    fn html_escaping() {
        assert_eq!(escape_html("a<b>&"), "a&lt;b&gt;&amp;");
    }
}
