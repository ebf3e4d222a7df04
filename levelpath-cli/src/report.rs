use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use levelpath_engine::{ExpCurve, Journey, PlannerStats, Step};

/// Everything one planner run produced.
#[derive(Debug, Clone)]
pub struct PlanRun {
    /// Each improvement in the order it was found; the last is the answer.
    pub journeys: Vec<Journey>,
    pub stats: PlannerStats,
    pub elapsed: Duration,
    /// The frontier ran dry, so the last journey is final.
    pub exhausted: bool,
}

impl PlanRun {
    pub fn best(&self) -> Option<&Journey> {
        self.journeys.last()
    }
}

#[derive(Serialize)]
struct Improvement {
    kills: u64,
    completed_quests: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    best: Option<&'a Journey>,
    improvements: Vec<Improvement>,
    stats: PlannerStats,
    elapsed_ms: u128,
    exhausted: bool,
}

fn step_line(curve: &ExpCurve, step: &Step) -> (String, String) {
    let levels = curve.to_level(step.exp_after());
    let position = format!("base {:.2} / job {:.2}", levels.base_lvl, levels.job_lvl);
    let action = match step {
        Step::Monster { name, kills, .. } => format!("Hunt {name} x{kills}"),
        Step::Quest { name, kills: 0, .. } => format!("Turn in {name}"),
        Step::Quest { name, kills, .. } => format!("Turn in {name} ({kills} kills)"),
    };
    (action, position)
}

pub fn generate_console_report(out: &mut dyn Write, curve: &ExpCurve, run: &PlanRun) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Leveling Route".bright_cyan().bold())?;
    writeln!(out, "{}", "=================".cyan())?;

    let Some(best) = run.best() else {
        writeln!(out, "{}", "No route reaches the target with the allowed monsters and quests.".red())?;
        return Ok(());
    };

    let start = curve.to_level(best.start);
    writeln!(
        out,
        "Start: base {:.2} / job {:.2}",
        start.base_lvl, start.job_lvl
    )?;
    for (index, step) in best.steps.iter().enumerate() {
        let (action, position) = step_line(curve, step);
        let action = match step {
            Step::Monster { .. } => action.yellow(),
            Step::Quest { .. } => action.green(),
        };
        writeln!(out, "{:>3}. {action} → {position}", index + 1)?;
    }
    writeln!(out)?;
    writeln!(out, "Total kills: {}", best.kills.to_string().bold())?;
    writeln!(out, "Quests completed: {}", best.completed_quests.len())?;
    writeln!(
        out,
        "Final level: base {:.2} / job {:.2}",
        best.levels.base_lvl, best.levels.job_lvl
    )?;

    writeln!(out)?;
    writeln!(out, "{}", "⚡ Search Summary".bright_yellow().bold())?;
    writeln!(out, "{}", "=================".yellow())?;
    writeln!(out, "Improvements: {}", run.journeys.len())?;
    writeln!(
        out,
        "Expanded: {}  Pushed: {}  Rejected: {}  Pruned: {}",
        run.stats.expanded, run.stats.pushed, run.stats.rejected, run.stats.pruned
    )?;
    if run.exhausted {
        writeln!(out, "Search complete: {}", "optimal".green())?;
    } else {
        writeln!(out, "Search stopped early: {}", "best so far".yellow())?;
    }
    writeln!(out, "Search time: {:?}", run.elapsed)?;
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, run: &PlanRun) -> Result<()> {
    let report = JsonReport {
        best: run.best(),
        improvements: run
            .journeys
            .iter()
            .map(|journey| Improvement {
                kills: journey.kills,
                completed_quests: journey.completed_quests.len(),
            })
            .collect(),
        stats: run.stats,
        elapsed_ms: run.elapsed.as_millis(),
        exhausted: run.exhausted,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, curve: &ExpCurve, run: &PlanRun) -> Result<()> {
    writeln!(out, "# Levelpath Route\n")?;

    let Some(best) = run.best() else {
        writeln!(out, "_No route reaches the target._")?;
        return Ok(());
    };

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total kills**: {}", best.kills)?;
    writeln!(out, "- **Quests completed**: {}", best.completed_quests.len())?;
    writeln!(
        out,
        "- **Final level**: base {:.2} / job {:.2}",
        best.levels.base_lvl, best.levels.job_lvl
    )?;
    let order: Vec<&str> = best.quest_steps().map(|id| id.as_str()).collect();
    if !order.is_empty() {
        writeln!(out, "- **Quest order**: {}", order.join(" → "))?;
    }
    writeln!(out, "- **Improvements found**: {}", run.journeys.len())?;
    writeln!(
        out,
        "- **Search**: {}\n",
        if run.exhausted { "complete" } else { "stopped early" }
    )?;

    writeln!(out, "## Steps\n")?;
    writeln!(out, "| # | Action | Reached |")?;
    writeln!(out, "|---|--------|---------|")?;
    for (index, step) in best.steps.iter().enumerate() {
        let (action, position) = step_line(curve, step);
        writeln!(out, "| {} | {action} | {position} |", index + 1)?;
    }
    Ok(())
}
