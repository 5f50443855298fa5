use std::collections::BTreeMap;
use std::io::{self, Write};

use colabfit::{AtomicConfiguration, Table};

use crate::util::text::truncate;

const INDENT: &str = "      ";

const BOX_INNER_WIDTH: usize = 62;
const SAFE_TABLE_WIDTH: usize = BOX_INNER_WIDTH - INDENT.len();

const MAX_DISTRIBUTION_ROWS: usize = 15;

pub fn print_structure_info(configurations: &[AtomicConfiguration]) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let nsites: usize = configurations.iter().map(|c| c.nsites()).sum();
    let periodic = configurations
        .iter()
        .filter(|c| c.nperiodic_dimensions() > 0)
        .count();
    let smallest = configurations.iter().map(|c| c.nsites()).min().unwrap_or(0);
    let largest = configurations.iter().map(|c| c.nsites()).max().unwrap_or(0);

    let mut formulas: Vec<String> = configurations
        .iter()
        .map(AtomicConfiguration::get_chemical_formula)
        .collect();
    formulas.sort_unstable();
    formulas.dedup();

    let rows = vec![
        ("Configurations", format!("{}", configurations.len())),
        ("Total Atoms", format!("{}", nsites)),
        ("Atoms / Config", format!("{} – {}", smallest, largest)),
        ("Periodic", format!("{}", periodic)),
        ("Unique Formulas", format!("{}", formulas.len())),
    ];

    print_kv_table(&mut out, "Structure Summary", &rows);
}

pub fn print_element_distribution(configurations: &[AtomicConfiguration]) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for config in configurations {
        for element in config.elements() {
            *counts.entry(element.symbol()).or_insert(0) += 1;
        }
    }

    let total: usize = counts.values().sum();
    let mut sorted: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(symbol, n)| (symbol.to_string(), n))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));

    print_distribution_table(&mut out, "Element Distribution", &sorted, total);
}

/// Rows written per table, with the file that received them.
pub fn print_ingest_summary(written: &[(Table, usize, String)]) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let table_w = 20usize;
    let rows_w = 8usize;
    let sep_overhead = 8;
    let file_w = SAFE_TABLE_WIDTH.saturating_sub(table_w + rows_w + sep_overhead);

    let _ = writeln!(out, "{}┌─ Tables Written ─┐", INDENT);
    let _ = writeln!(
        out,
        "{}┌{t_line}┬{r_line}┬{f_line}┐",
        INDENT,
        t_line = "─".repeat(table_w + 2),
        r_line = "─".repeat(rows_w + 2),
        f_line = "─".repeat(file_w + 2)
    );
    let _ = writeln!(
        out,
        "{}│ {:<table_w$} │ {:>rows_w$} │ {:<file_w$} │",
        INDENT, "Table", "Rows", "File",
    );
    let _ = writeln!(
        out,
        "{}├{t_line}┼{r_line}┼{f_line}┤",
        INDENT,
        t_line = "─".repeat(table_w + 2),
        r_line = "─".repeat(rows_w + 2),
        f_line = "─".repeat(file_w + 2)
    );

    for (table, n, file) in written {
        let _ = writeln!(
            out,
            "{}│ {:<table_w$} │ {:>rows_w$} │ {:<file_w$} │",
            INDENT,
            truncate(table.name(), table_w),
            n,
            truncate(file, file_w),
        );
    }

    let _ = writeln!(
        out,
        "{}└{t_line}┴{r_line}┴{f_line}┘",
        INDENT,
        t_line = "─".repeat(table_w + 2),
        r_line = "─".repeat(rows_w + 2),
        f_line = "─".repeat(file_w + 2)
    );
}

fn print_distribution_table(
    out: &mut impl Write,
    title: &str,
    data: &[(String, usize)],
    total: usize,
) {
    let name_w = 10usize;
    let count_w = 8usize;
    let sep_overhead = 6;
    let dist_w = SAFE_TABLE_WIDTH.saturating_sub(name_w + count_w + sep_overhead);
    let max_bar_width = dist_w.saturating_sub(8).min(20);

    let _ = writeln!(
        out,
        "{}┌─ {} ─┐",
        INDENT,
        truncate(title, SAFE_TABLE_WIDTH - 6)
    );
    let _ = writeln!(
        out,
        "{}┌{name_line}┬{count_line}┬{dist_line}┐",
        INDENT,
        name_line = "─".repeat(name_w + 2),
        count_line = "─".repeat(count_w + 2),
        dist_line = "─".repeat(dist_w + 2)
    );
    let _ = writeln!(
        out,
        "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
        INDENT, "Element", "Atoms", "Distribution",
    );
    let _ = writeln!(
        out,
        "{}├{name_line}┼{count_line}┼{dist_line}┤",
        INDENT,
        name_line = "─".repeat(name_w + 2),
        count_line = "─".repeat(count_w + 2),
        dist_line = "─".repeat(dist_w + 2)
    );

    for (name, count) in data.iter().take(MAX_DISTRIBUTION_ROWS) {
        let pct = if total == 0 {
            0.0
        } else {
            (*count as f64 / total as f64) * 100.0
        };
        let dist_cell = format!("{}  {:>5.1}%", make_bar(pct, max_bar_width), pct);
        let _ = writeln!(
            out,
            "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
            INDENT,
            truncate(name, name_w),
            count,
            dist_cell,
        );
    }

    if data.len() > MAX_DISTRIBUTION_ROWS {
        let _ = writeln!(
            out,
            "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
            INDENT,
            "...",
            "...",
            format!("({} more elements)", data.len() - MAX_DISTRIBUTION_ROWS),
        );
    }

    let _ = writeln!(
        out,
        "{}└{name_line}┴{count_line}┴{dist_line}┘",
        INDENT,
        name_line = "─".repeat(name_w + 2),
        count_line = "─".repeat(count_w + 2),
        dist_line = "─".repeat(dist_w + 2)
    );
}

fn print_kv_table(out: &mut impl Write, title: &str, rows: &[(&str, String)]) {
    let key_w = 16usize;
    let sep_overhead = 6;
    let val_w = SAFE_TABLE_WIDTH.saturating_sub(key_w + sep_overhead);

    let _ = writeln!(
        out,
        "{}┌─ {} ─┐",
        INDENT,
        truncate(title, SAFE_TABLE_WIDTH - 6)
    );
    let _ = writeln!(
        out,
        "{}┌{k_line}┬{v_line}┐",
        INDENT,
        k_line = "─".repeat(key_w + 2),
        v_line = "─".repeat(val_w + 2)
    );
    let _ = writeln!(
        out,
        "{}│ {:<key_w$} │ {:>val_w$} │",
        INDENT, "Metric", "Value",
    );
    let _ = writeln!(
        out,
        "{}├{k_line}┼{v_line}┤",
        INDENT,
        k_line = "─".repeat(key_w + 2),
        v_line = "─".repeat(val_w + 2)
    );

    for (key, val) in rows {
        let _ = writeln!(
            out,
            "{}│ {:<key_w$} │ {:>val_w$} │",
            INDENT,
            truncate(key, key_w),
            truncate(val, val_w),
        );
    }

    let _ = writeln!(
        out,
        "{}└{k_line}┴{v_line}┘",
        INDENT,
        k_line = "─".repeat(key_w + 2),
        v_line = "─".repeat(val_w + 2)
    );
}

fn make_bar(pct: f64, max_width: usize) -> String {
    let filled = (((pct / 100.0) * max_width as f64).round() as usize).min(max_width);
    let empty = max_width - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}
