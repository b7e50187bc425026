use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use timeforge::projector::{FusedCell, Grid, SessionContent};
use timeforge::search::{RunResult, SearchOutcome};
use timeforge::verifier::VerificationReport;

fn score_color(pct: f64) -> Color {
    if pct >= 100.0 {
        Color::Green
    } else if pct >= 90.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

pub fn print_verification_report(report: &VerificationReport) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Category").add_attribute(Attribute::Bold),
        Cell::new("Tag"),
        Cell::new("Checked"),
        Cell::new("Satisfied"),
        Cell::new("Score").fg(Color::Cyan),
        Cell::new("Violations").fg(Color::Red),
    ]);

    for i in 2..=5 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    for c in &report.categories {
        let pct = c.percentage();
        table.add_row(vec![
            Cell::new(c.category.to_string()).add_attribute(Attribute::Bold),
            Cell::new(if c.mandatory { "mandatory" } else { "optional" }),
            Cell::new(c.checked),
            Cell::new(c.satisfied),
            Cell::new(format!("{:.1}%", pct)).fg(score_color(pct)),
            Cell::new(c.violations.len()),
        ]);
    }
    println!("\n{}", table);

    let mut summary = Table::new();
    summary.load_preset(ASCII_FULL);
    summary.add_row(vec![
        Cell::new("Global").add_attribute(Attribute::Bold),
        Cell::new(format!("{:.2}%", report.global_score)).fg(score_color(report.global_score)),
    ]);
    summary.add_row(vec![
        Cell::new("Mandatory"),
        Cell::new(format!("{:.2}%", report.mandatory_score)).fg(score_color(report.mandatory_score)),
    ]);
    summary.add_row(vec![
        Cell::new("Optional"),
        Cell::new(format!("{:.2}%", report.optional_score)).fg(score_color(report.optional_score)),
    ]);
    summary.add_row(vec![Cell::new("Idle periods"), Cell::new(report.idle_periods)]);
    println!("{}", summary);
}

/// Lists at most `limit` violations per category.
pub fn print_violations(report: &VerificationReport, limit: usize) {
    for c in report.categories.iter().filter(|c| !c.violations.is_empty()) {
        println!("\n[{}] {} violation(s)", c.category, c.violations.len());
        for v in c.violations.iter().take(limit) {
            println!("  - {}", v.message);
        }
        if c.violations.len() > limit {
            println!("  ... {} more", c.violations.len() - limit);
        }
    }
}

pub fn print_runs(outcome: &SearchOutcome) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Attempt").add_attribute(Attribute::Bold),
        Cell::new("Seed"),
        Cell::new("Score").fg(Color::Cyan),
        Cell::new("Mandatory"),
        Cell::new("Optional"),
        Cell::new("Soft"),
        Cell::new("Idle"),
    ]);

    let rows: Vec<&RunResult> = if outcome.runs.is_empty() {
        vec![&outcome.best]
    } else {
        outcome.runs.iter().collect()
    };

    for run in rows {
        let marker = if run.attempt == outcome.best.attempt { " *" } else { "" };
        table.add_row(vec![
            Cell::new(format!("#{}{}", run.attempt, marker)).add_attribute(Attribute::Bold),
            Cell::new(run.seed),
            Cell::new(format!("{:.2}%", run.score)).fg(score_color(run.score)),
            Cell::new(format!("{:.2}%", run.report.mandatory_score)),
            Cell::new(format!("{:.2}%", run.report.optional_score)),
            Cell::new(format!("{:.1}", run.objective.soft)),
            Cell::new(run.objective.idle_periods),
        ]);
    }
    println!("\n{}", table);
}

fn render_content(c: &SessionContent) -> String {
    let mut lines = vec![c.subjects.join("/")];
    if !c.teachers.is_empty() {
        lines.push(c.teachers.join("/"));
    }
    if !c.rooms.is_empty() {
        lines.push(c.rooms.join("/"));
    }
    lines.join("\n")
}

fn render_fused(cell: &Option<FusedCell>) -> String {
    match cell {
        None => String::new(),
        Some(FusedCell::Full(c)) => render_content(c),
        Some(FusedCell::Split { a, b }) => {
            let half = |w: &str, c: &Option<SessionContent>| match c {
                Some(c) => format!("{}: {}", w, c.subjects.join("/")),
                None => format!("{}: -", w),
            };
            format!("{}\n{}", half("A", a), half("B", b))
        }
    }
}

/// Periods as rows, days as columns.
pub fn print_schedule_grid(name: &str, grid: &Grid<FusedCell>) {
    println!("\nSchedule: {}", name);
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![Cell::new("")];
    header.extend(
        grid.iter()
            .map(|d| Cell::new(&d.day).add_attribute(Attribute::Bold)),
    );
    table.set_header(header);

    let period_count = grid.first().map_or(0, |d| d.periods.len());
    for p in 0..period_count {
        let label = grid[0].periods[p].period.clone();
        let mut row = vec![Cell::new(label).add_attribute(Attribute::Bold)];
        row.extend(grid.iter().map(|d| {
            Cell::new(render_fused(&d.periods[p].content)).set_alignment(CellAlignment::Center)
        }));
        table.add_row(row);
    }
    println!("{}", table);
}
