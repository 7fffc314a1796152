//! Plain-text tables for terminal output.
//!
//! Columns are padded to their widest cell and separated by two spaces; a dashed
//! rule sits under the header. Control characters inside cells become spaces and
//! ANSI colour sequences do not count towards a cell's width.

use std::fmt::Write as _;

const COLUMN_GAP: &str = "  ";
const MIN_RULE_WIDTH: usize = 3;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let widths = column_widths(headers, rows);
    let rule = widths
        .iter()
        .map(|width| "-".repeat((*width).max(MIN_RULE_WIDTH)))
        .collect::<Vec<_>>();
    let rule_widths = widths
        .iter()
        .map(|width| (*width).max(MIN_RULE_WIDTH))
        .collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "{}", render_line(headers, &widths));
    let _ = writeln!(output, "{}", render_line(&rule, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", render_line(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn column_widths(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            rows.iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| visible_width(cell))
                .fold(visible_width(header), usize::max)
                .max(1)
        })
        .collect()
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if idx > 0 {
            line.push_str(COLUMN_GAP);
        }
        let cell = flatten_whitespace(cell);
        let padding = width.saturating_sub(visible_width(&cell));
        line.push_str(&cell);
        line.extend(std::iter::repeat_n(' ', padding));
    }
    line.truncate(line.trim_end_matches(' ').len());
    line
}

/// Character count, ignoring `ESC [ ... m` colour sequences.
fn visible_width(value: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    for ch in value.chars() {
        match (in_escape, ch) {
            (false, '\u{1b}') => in_escape = true,
            (false, _) => width += 1,
            (true, 'm') => in_escape = false,
            (true, _) => {}
        }
    }
    width
}

fn flatten_whitespace(value: &str) -> String {
    value
        .chars()
        .map(|ch| if matches!(ch, '\n' | '\r' | '\t') { ' ' } else { ch })
        .collect()
}
