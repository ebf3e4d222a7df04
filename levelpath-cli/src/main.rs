mod report;
mod util;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use levelpath_engine::{
    Catalog, ExpCurve, ExpPoint, IgnoreWaste, LevelExp, MonsterId, OvercapSettings, PlanRequest,
    Planner, QuestId, Rates, TieBreak,
};
use report::PlanRun;
use util::select_ids;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored route for the terminal
    Console,
    /// Machine-readable route and search statistics
    Json,
    /// Markdown table of the route
    Markdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WasteArg {
    /// Always accept a capped quest reward
    Always,
    /// Accept unless it leaves a track within one level of its maximum
    ShortOfTarget,
    /// Accept unless it reaches the maximum level
    FullTarget,
    /// Never accept waste; grind up first
    Never,
}

impl From<WasteArg> for IgnoreWaste {
    fn from(arg: WasteArg) -> Self {
        match arg {
            WasteArg::Always => Self::Always,
            WasteArg::ShortOfTarget => Self::ShortOfTarget,
            WasteArg::FullTarget => Self::FullTarget,
            WasteArg::Never => Self::Never,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TieBreakArg {
    /// Prefer the route completing more quests
    MoreQuests,
    /// Prefer the route completing fewer quests
    FewerQuests,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::MoreQuests => Self::MoreQuests,
            TieBreakArg::FewerQuests => Self::FewerQuests,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "levelpath", version)]
#[command(about = "Plan the leveling route with the fewest kills through quests and monsters")]
struct Args {
    /// Starting base level (fractional part is progress into the level)
    #[arg(long, default_value_t = 1.0)]
    start_base: f64,

    /// Starting job level
    #[arg(long, default_value_t = 1.0)]
    start_job: f64,

    /// Target base level
    #[arg(long, default_value_t = 1.0)]
    target_base: f64,

    /// Target job level
    #[arg(long, default_value_t = 50.0)]
    target_job: f64,

    /// Monsters to hunt (comma-separated ids, or "all")
    #[arg(long, default_value = "all")]
    monsters: String,

    /// Quests to consider (comma-separated ids, "all" or "none")
    #[arg(long, default_value = "all")]
    quests: String,

    /// Quests already completed (comma-separated ids)
    #[arg(long, default_value = "")]
    completed: String,

    /// Multiplier for monster experience
    #[arg(long, default_value_t = 1.0)]
    monster_rate: f64,

    /// Multiplier for quest experience
    #[arg(long, default_value_t = 1.0)]
    quest_rate: f64,

    /// When a capped quest reward is acceptable
    #[arg(long, value_enum, default_value_t = WasteArg::ShortOfTarget)]
    waste: WasteArg,

    /// Waste percentage of a quest reward that is always acceptable
    #[arg(long, default_value_t = 0.0)]
    allow_waste: f64,

    /// How to order routes with equal kills
    #[arg(long, value_enum, default_value_t = TieBreakArg::MoreQuests)]
    tie_break: TieBreakArg,

    /// Read the whole plan request from a JSON file instead of the flags above
    #[arg(long)]
    request: Option<PathBuf>,

    /// Stop looking for better routes after this many seconds
    #[arg(long)]
    time_limit_secs: Option<u64>,

    /// Stop after this many improvements
    #[arg(long)]
    max_results: Option<usize>,

    /// List bundled monsters and quests and exit
    #[arg(long)]
    list: bool,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print every improvement as it is found
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_catalog(&args)? {
        return Ok(());
    }

    if shows_banner(&args) {
        announce_banner();
    }

    let request = build_request(&args)?;
    let curve = ExpCurve::bundled();
    let planner =
        Planner::new(curve, Catalog::bundled(), &request).context("invalid plan request")?;
    let run = drive_planner(&args, planner);

    write_reports(&args, curve, &run)?;

    if run.best().is_none() {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_catalog(args: &Args) -> Result<bool> {
    if !args.list {
        return Ok(false);
    }
    let catalog = Catalog::bundled();
    let mut output_target = OutputTarget::open(args.output.as_deref())?;
    writeln!(output_target, "Monsters:")?;
    for monster in catalog.monsters() {
        writeln!(
            output_target,
            "  {:25} - {} (base level {})",
            monster.id.as_str(),
            monster.name,
            monster.min_base_level()
        )?;
    }
    writeln!(output_target, "Quests:")?;
    for quest in catalog.quests() {
        writeln!(
            output_target,
            "  {:25} - {}",
            quest.id().as_str(),
            quest.name()
        )?;
    }
    output_target.flush()?;
    Ok(true)
}

const fn shows_banner(args: &Args) -> bool {
    args.output.is_some() || matches!(args.report, ReportFormat::Console)
}

fn announce_banner() {
    println!("{}", "🗺️  Levelpath Route Planner".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn build_request(args: &Args) -> Result<PlanRequest> {
    let request = match &args.request {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse plan request {}", path.display()))?
        }
        None => request_from_flags(args),
    };
    validate_request(&request)?;
    Ok(request)
}

fn validate_request(request: &PlanRequest) -> Result<()> {
    for (name, value) in [
        ("monster rate", request.rates.monster),
        ("quest rate", request.rates.quest),
    ] {
        if !value.is_finite() || value < 0.0 {
            bail!("{name} must be a non-negative number, got {value}");
        }
    }
    let allowance = request.overcap.allow_percent_waste;
    if !(0.0..=100.0).contains(&allowance) {
        bail!("allowed waste must be between 0 and 100 percent, got {allowance}");
    }
    Ok(())
}

fn request_from_flags(args: &Args) -> PlanRequest {
    let catalog = Catalog::bundled();
    PlanRequest {
        allowed_monsters: select_ids(&args.monsters, catalog.monster_ids().map(MonsterId::as_str))
            .into_iter()
            .map(MonsterId::new)
            .collect(),
        allowed_quests: select_ids(&args.quests, catalog.quest_ids().map(QuestId::as_str))
            .into_iter()
            .map(QuestId::new)
            .collect(),
        completed_quests: select_ids(&args.completed, std::iter::empty())
            .into_iter()
            .map(QuestId::new)
            .collect(),
        overcap: OvercapSettings::new(args.waste.into(), args.allow_waste),
        tie_break: args.tie_break.into(),
        rates: Rates {
            monster: args.monster_rate,
            quest: args.quest_rate,
        },
        ..PlanRequest::new(
            ExpPoint::Level(LevelExp::new(args.start_base, args.start_job)),
            ExpPoint::Level(LevelExp::new(args.target_base, args.target_job)),
        )
    }
}

/// Pull improvements until the search finishes or a caller-side limit hits.
fn drive_planner(args: &Args, mut planner: Planner<'_>) -> PlanRun {
    let start_time = Instant::now();
    let deadline = args.time_limit_secs.map(Duration::from_secs);
    let mut journeys = Vec::new();
    let mut exhausted = true;

    while let Some(journey) = planner.next() {
        if args.verbose {
            eprintln!(
                "✨ {} kills, {} quests ({:?})",
                journey.kills.to_string().green(),
                journey.completed_quests.len(),
                start_time.elapsed()
            );
        }
        journeys.push(journey);

        let hit_cap = args.max_results.is_some_and(|cap| journeys.len() >= cap);
        let out_of_time = deadline.is_some_and(|limit| start_time.elapsed() >= limit);
        if hit_cap || out_of_time {
            exhausted = planner.frontier_len() == 0;
            info!("stopping early with {} journeys in the frontier", planner.frontier_len());
            break;
        }
    }

    PlanRun {
        journeys,
        stats: planner.stats(),
        elapsed: start_time.elapsed(),
        exhausted,
    }
}

fn write_reports(args: &Args, curve: &ExpCurve, run: &PlanRun) -> Result<()> {
    let mut output_target = OutputTarget::open(args.output.as_deref())?;

    match args.report {
        ReportFormat::Json => report::generate_json_report(&mut output_target, run)?,
        ReportFormat::Markdown => report::generate_markdown_report(&mut output_target, curve, run)?,
        ReportFormat::Console => {
            report::generate_console_report(&mut output_target, curve, run)?;
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {:?}", run.elapsed)?;
        }
    }

    output_target.flush()?;
    Ok(())
}

/// Report destination: the `--output` file, or stdout.
struct OutputTarget(BufWriter<Box<dyn Write>>);

impl OutputTarget {
    fn open(path: Option<&Path>) -> Result<Self> {
        let sink: Box<dyn Write> = match path {
            Some(path) => Box::new(
                File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
            ),
            None => Box::new(stdout()),
        };
        Ok(Self(BufWriter::new(sink)))
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}
