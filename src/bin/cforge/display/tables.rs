use std::collections::HashMap;
use std::io::{self, Write};

use crystal_forge::Element;
use crystal_forge::explore::{ExampleSummary, Pipeline, BaselineReport};
use crystal_forge::fetch::{Dropped, FetchReport};

use crate::util::text::{file_label, shape, truncate};

const INDENT: &str = "      ";

const BOX_INNER_WIDTH: usize = 62;
const SAFE_TABLE_WIDTH: usize = BOX_INNER_WIDTH - INDENT.len();

pub fn print_fetch_summary(report: &FetchReport) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let rows = vec![
        ("Queried", report.queried.to_string()),
        ("Kept", report.kept.to_string()),
        ("Dropped", report.dropped.len().to_string()),
        ("Repeated", report.duplicates.len().to_string()),
        ("Summary Table", report.csv_path.display().to_string()),
        ("CIF Directory", report.cif_dir.display().to_string()),
    ];

    print_kv_table(&mut out, "Fetch Summary", &rows);
}

/// How often each out-of-list element caused a record to be dropped.
pub fn print_dropped(dropped: &[Dropped]) {
    if dropped.is_empty() {
        return;
    }

    let mut counts: HashMap<Element, usize> = HashMap::new();
    for d in dropped {
        for element in d.disallowed.iter() {
            *counts.entry(element).or_insert(0) += 1;
        }
    }

    let mut sorted: Vec<_> = counts
        .into_iter()
        .map(|(e, c)| (e.symbol().to_string(), c))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let stderr = io::stderr();
    let mut out = stderr.lock();
    print_distribution_table(&mut out, "Disallowed Elements", &sorted, dropped.len());
}

pub fn print_example(summary: &ExampleSummary) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let rows = vec![
        ("Structure", summary.id.clone()),
        ("Target", format!("{:.6}", summary.target)),
        ("atom_fea", shape(&summary.atom_fea)),
        ("nbr_fea", shape(&summary.nbr_fea)),
        ("nbr_fea_idx", shape(&summary.nbr_fea_idx)),
        ("atom_nbr_fea", shape(&summary.atom_nbr_fea)),
        ("total_nbr_fea", shape(&summary.total_nbr_fea)),
        ("total_gated_fea", shape(&summary.total_gated_fea)),
    ];

    print_kv_table(&mut out, "Example Features", &rows);
}

pub fn print_pipeline(pipeline: &Pipeline, baseline: &BaselineReport) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let test = pipeline
        .loaders
        .test
        .as_ref()
        .map(|l| l.len().to_string())
        .unwrap_or_else(|| "-".to_string());
    let cfg = &pipeline.model_config;

    let rows = vec![
        (
            "Split",
            format!(
                "{} / {} / {}",
                pipeline.loaders.train.len(),
                pipeline.loaders.val.len(),
                test
            ),
        ),
        (
            "Batches",
            format!(
                "{} × {}",
                pipeline.loaders.train.num_batches(),
                pipeline.loaders.train.batch_size()
            ),
        ),
        (
            "Normalizer",
            format!(
                "μ {:.4}  σ {:.4}",
                pipeline.normalizer.mean, pipeline.normalizer.std
            ),
        ),
        (
            "Network",
            format!(
                "{} conv, {}→{} atom, {} hidden, {} pool",
                cfg.n_conv, cfg.orig_atom_fea_len, cfg.atom_fea_len, cfg.h_fea_len, cfg.pool
            ),
        ),
        ("Parameters", pipeline.parameter_count().to_string()),
        ("Criterion", pipeline.criterion.to_string()),
        (
            "Optimizer",
            format!(
                "{} (lr {})",
                pipeline.optimizer.kind(),
                pipeline.optimizer.learning_rate()
            ),
        ),
        (
            "Baseline Batch",
            format!("{} crystals, {} atoms", baseline.crystals, baseline.atoms),
        ),
        ("Untrained Loss", format!("{:.6}", baseline.loss)),
    ];

    print_kv_table(&mut out, "Training Pipeline", &rows);
}

/// Short form of a path for substep lines.
pub fn path_label(path: &std::path::Path) -> String {
    truncate(&file_label(path), 32)
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
        INDENT, "Element", "Records", "Share of dropped",
    );
    let _ = writeln!(
        out,
        "{}├{name_line}┼{count_line}┼{dist_line}┤",
        INDENT,
        name_line = "─".repeat(name_w + 2),
        count_line = "─".repeat(count_w + 2),
        dist_line = "─".repeat(dist_w + 2)
    );

    for (name, count) in data.iter().take(15) {
        let pct = (*count as f64 / total.max(1) as f64) * 100.0;
        let bar = make_bar(pct, max_bar_width);
        let dist_cell = format!("{}  {:>5.1}%", bar, pct);
        let _ = writeln!(
            out,
            "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
            INDENT,
            truncate(name, name_w),
            count,
            dist_cell,
        );
    }

    if data.len() > 15 {
        let _ = writeln!(
            out,
            "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
            INDENT,
            "...",
            "...",
            format!("({} more elements)", data.len() - 15),
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
            truncate_left(val, val_w),
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

/// Keeps the tail of long values; paths are more telling at the end.
fn truncate_left(s: &str, max_len: usize) -> String {
    let n = s.chars().count();
    if n <= max_len || max_len == 0 {
        return truncate(s, max_len);
    }
    let mut out = String::from("…");
    out.extend(s.chars().skip(n - (max_len - 1)));
    out
}

fn make_bar(pct: f64, max_width: usize) -> String {
    let filled = ((pct / 100.0) * max_width as f64).round() as usize;
    let empty = max_width.saturating_sub(filled);
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(make_bar(50.0, 4), "██░░");
        assert_eq!(make_bar(0.0, 3), "░░░");
        assert_eq!(make_bar(100.0, 2), "██");
    }

    #[test]
    fn long_paths_keep_their_tail() {
        let s = truncate_left("data/final_energy_cifs", 10);
        assert_eq!(s.chars().count(), 10);
        assert!(s.starts_with('…'));
        assert!(s.ends_with("rgy_cifs"));
        assert_eq!(truncate_left("data", 10), "data");
    }

    #[test]
    fn distribution_table_lists_elements() {
        let mut buf = Vec::new();
        let data = vec![("Xe".to_string(), 3), ("Kr".to_string(), 1)];
        print_distribution_table(&mut buf, "Disallowed Elements", &data, 4);
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Disallowed Elements"));
        assert!(text.contains("Xe"));
        assert!(text.contains("75.0%"));
        assert!(text.contains("25.0%"));
    }
}
