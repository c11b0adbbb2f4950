//! Plain-text rendering of reports, problems, and history listings.

use crate::history::HistoryPage;
use crate::report::Report;
use crate::types::Problem;

pub fn render_report(report: &Report) -> String {
    let mut out = String::new();

    out.push_str("Shopping List\n");
    for line in &report.shopping_list {
        out.push_str(&format!(
            "  Buy {}x {}\" boards  ${:.2}\n",
            line.quantity, line.board, line.line_cost
        ));
    }
    out.push_str(&format!("  Total Cost: ${:.2}\n", report.total_cost));

    out.push_str("\nCutting Instructions\n");
    for group in &report.cutting {
        out.push_str(&format!("  {}\" boards:\n", group.board));
        for (i, instance) in group.instances.iter().enumerate() {
            let cuts = instance
                .cuts
                .iter()
                .map(|c| format!("{c}\""))
                .collect::<Vec<_>>()
                .join(" + ");
            out.push_str(&format!(
                "    Board #{}: {} = {}\" (waste: {}\")\n",
                i + 1,
                cuts,
                instance.used,
                instance.waste
            ));
        }
    }

    out.push_str("\nWaste Summary\n");
    for line in &report.waste {
        out.push_str(&format!(
            "  {}\": {}\" total waste\n",
            line.board, line.waste
        ));
    }
    out.push_str(&format!("  Total Waste: {}\"\n", report.total_waste));

    if !report.inconsistencies.is_empty() {
        out.push('\n');
        for inconsistency in &report.inconsistencies {
            out.push_str(&format!("Warning: {inconsistency}\n"));
        }
    }

    out
}

/// The current problem as an editable listing, indices included so `cut set`
/// and `board rm` have something to point at.
pub fn render_problem(problem: &Problem) -> String {
    let mut out = String::new();

    if let Some(name) = &problem.project_name {
        out.push_str(&format!("Project: {name}\n\n"));
    }

    out.push_str("Required Cuts (all measurements in inches)\n");
    if problem.cuts.is_empty() {
        out.push_str("  (none)\n");
    }
    for (i, cut) in problem.cuts.iter().enumerate() {
        out.push_str(&format!("  [{}] {} x{}\n", i, cut, cut.quantity));
    }

    out.push_str("\nAvailable Boards\n");
    if problem.boards.is_empty() {
        out.push_str("  (none)\n");
    }
    for (i, board) in problem.boards.iter().enumerate() {
        out.push_str(&format!("  [{}] {}  ${:.2}\n", i, board, board.price));
    }

    if !problem.is_submittable() {
        out.push_str("\nAdd at least one cut and one board before optimizing.\n");
    }

    out
}

pub fn render_history_page(page: &HistoryPage) -> String {
    let mut out = String::new();

    if page.entries.is_empty() {
        out.push_str("No saved optimizations.\n");
        return out;
    }

    for entry in &page.entries {
        let name = entry.project_name.as_deref().unwrap_or("(unnamed)");
        out.push_str(&format!(
            "  {}  {}  ${:.2}  {}\n",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            name,
            entry.total_cost,
            entry.id
        ));
    }

    out.push_str(&format!(
        "\nPage {} of {} ({} total)",
        page.page,
        page.total_pages(),
        page.total
    ));
    if page.has_prev() || page.has_next() {
        out.push_str("  [");
        if page.has_prev() {
            out.push_str(&format!("--page {} for previous", page.page - 1));
        }
        if page.has_prev() && page.has_next() {
            out.push_str(", ");
        }
        if page.has_next() {
            out.push_str(&format!("--page {} for next", page.page + 1));
        }
        out.push(']');
    }
    out.push('\n');

    out
}
