use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rangebinder_core::{
    Axis, BinderConfig, Constraints, FixedSizeComputer, Item, ItemAttributes, LayoutInfo,
    RangeEstimator, Size,
};
use rangebinder_scheduler::{
    BinderStats, Phase, StructuralChange, VisibleRange, WindowScheduler, WorkingRange,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const REPLAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "rangebinder-cli")]
#[command(about = "Range-windowed materialization harness")]
pub struct Cli {
    /// Log scheduler decisions at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Estimate how many items fill one viewport.
    Estimate {
        #[arg(long, value_name = "WxH", value_parser = parse_size)]
        item: Size,
        #[arg(long, value_name = "WxH", value_parser = parse_size)]
        viewport: Size,
        #[arg(long, value_enum, default_value_t = ScrollAxis::Vertical)]
        axis: ScrollAxis,
        /// Cells per row; 1 for a linear list.
        #[arg(long, default_value_t = 1)]
        span_count: u32,
    },
    /// Drive a scheduler through a JSON operation script and print the
    /// resulting window as JSON.
    Replay {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
        /// Configuration file; `RANGEBINDER_*` variables apply otherwise.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Background workers; 0 runs jobs on the calling thread.
        #[arg(long, default_value_t = 0)]
        workers: usize,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
enum ScrollAxis {
    #[default]
    Vertical,
    Horizontal,
}

impl From<ScrollAxis> for Axis {
    fn from(axis: ScrollAxis) -> Self {
        match axis {
            ScrollAxis::Vertical => Axis::Vertical,
            ScrollAxis::Horizontal => Axis::Horizontal,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Dimensions {
    width: u32,
    height: u32,
}

impl From<Dimensions> for Size {
    fn from(d: Dimensions) -> Self {
        Size::new(d.width, d.height)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LayoutKind {
    #[default]
    Linear,
    Grid {
        span_count: u32,
    },
    Staggered {
        span_count: u32,
    },
}

impl From<LayoutKind> for LayoutInfo {
    fn from(kind: LayoutKind) -> Self {
        match kind {
            LayoutKind::Linear => LayoutInfo::Linear,
            LayoutKind::Grid { span_count } => LayoutInfo::Grid { span_count },
            LayoutKind::Staggered { span_count } => LayoutInfo::Staggered { span_count },
        }
    }
}

/// One step of a replay script.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ScriptOp {
    Scroll {
        first: usize,
        last: usize,
    },
    Insert {
        position: usize,
        #[serde(default = "one")]
        count: usize,
        #[serde(default)]
        sticky: bool,
    },
    Remove {
        position: usize,
        #[serde(default = "one")]
        count: usize,
    },
    Move {
        from: usize,
        to: usize,
    },
    Update {
        position: usize,
        #[serde(default = "one")]
        count: usize,
    },
    Resize {
        width: u32,
        height: u32,
    },
}

fn one() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct Script {
    viewport: Dimensions,
    item_size: Dimensions,
    #[serde(default)]
    scroll_axis: ScrollAxis,
    #[serde(default)]
    layout: LayoutKind,
    range_ratio: Option<f32>,
    initial_items: usize,
    #[serde(default)]
    sticky: Vec<usize>,
    #[serde(default)]
    operations: Vec<ScriptOp>,
}

#[derive(Debug, Serialize)]
struct EstimateOutput {
    estimated_viewport_count: usize,
    range_size: usize,
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
    phase: Phase,
    item_count: usize,
    estimated_viewport_count: Option<usize>,
    working_range: Option<WorkingRange>,
    visible_range: Option<[usize; 2]>,
    materialized_positions: Vec<usize>,
    changes: Vec<StructuralChange>,
    stats: BinderStats,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match cli.command {
        Commands::Estimate {
            item,
            viewport,
            axis,
            span_count,
        } => run_estimate(item, viewport, axis, span_count),
        Commands::Replay {
            script,
            config,
            workers,
        } => run_replay(&script, config.as_deref(), workers),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

fn parse_size(value: &str) -> Result<Size, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got `{value}`"))?;
    let width = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in `{value}`"))?;
    let height = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in `{value}`"))?;
    Ok(Size::new(width, height))
}

fn run_estimate(item: Size, viewport: Size, axis: ScrollAxis, span_count: u32) -> Result<()> {
    let layout = if span_count > 1 {
        LayoutInfo::Grid { span_count }
    } else {
        LayoutInfo::Linear
    };
    layout.validate()?;

    let axis = Axis::from(axis);
    let estimate = RangeEstimator::from_first_item(item, viewport, axis);
    let payload = EstimateOutput {
        estimated_viewport_count: estimate.estimated_viewport_count,
        range_size: layout.approximate_range_size(item, viewport, axis),
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BinderConfig> {
    match path {
        Some(path) => BinderConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => BinderConfig::from_env().context("invalid RANGEBINDER_* environment"),
    }
}

fn read_script(path: &Path) -> Result<Script> {
    if !path.is_file() {
        anyhow::bail!("script does not exist: {}", path.display());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid replay script {}", path.display()))
}

fn make_items(start: usize, count: usize, sticky: &[usize]) -> Vec<Item> {
    (start..start + count)
        .map(|index| {
            let item = Item::new(index);
            if sticky.contains(&index) {
                item.with_attributes(ItemAttributes::sticky())
            } else {
                item
            }
        })
        .collect()
}

fn run_replay(script_path: &Path, config_path: Option<&Path>, workers: usize) -> Result<()> {
    let script = read_script(script_path)?;

    let mut config = load_config(config_path)?.with_worker_threads(workers);
    if let Some(ratio) = script.range_ratio {
        config = config.with_range_ratio(ratio);
    }

    let changes = Arc::new(Mutex::new(Vec::new()));
    let recorder = changes.clone();
    let item_size = Size::from(script.item_size);
    let scheduler = WindowScheduler::builder()
        .layout_computer(Arc::new(FixedSizeComputer::new(item_size.width, item_size.height)))
        .listener(Arc::new(move |change: StructuralChange| {
            recorder
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(change);
        }))
        .layout_info(script.layout.into())
        .scroll_axis(script.scroll_axis.into())
        .config(config)
        .build()
        .context("failed to build scheduler")?;

    let viewport = Size::from(script.viewport);
    scheduler.measure(Constraints::exact(viewport.width, viewport.height), None)?;
    scheduler.insert_range_at(0, make_items(0, script.initial_items, &script.sticky))?;
    scheduler.on_container_size_known(viewport.width, viewport.height)?;

    let mut next_index = script.initial_items;
    for (step, op) in script.operations.iter().enumerate() {
        apply_op(&scheduler, op, &mut next_index)
            .with_context(|| format!("operation {} ({:?}) failed", step, op))?;
        scheduler.process_completions()?;
    }

    if !scheduler.wait_idle(REPLAY_TIMEOUT)? {
        anyhow::bail!("background materialization did not finish");
    }

    let changes = std::mem::take(&mut *changes.lock().unwrap_or_else(PoisonError::into_inner));
    let payload = ReplayOutput {
        phase: scheduler.phase(),
        item_count: scheduler.item_count(),
        estimated_viewport_count: scheduler.estimate().map(|e| e.estimated_viewport_count),
        working_range: scheduler.working_range(),
        visible_range: scheduler
            .visible_range()
            .map(|VisibleRange { first, last }| [first, last]),
        materialized_positions: scheduler.materialized_positions(),
        changes,
        stats: scheduler.stats(),
    };
    scheduler.release();

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn apply_op(scheduler: &WindowScheduler, op: &ScriptOp, next_index: &mut usize) -> Result<()> {
    match *op {
        ScriptOp::Scroll { first, last } => scheduler.on_scroll(first, last)?,
        ScriptOp::Insert {
            position,
            count,
            sticky,
        } => {
            let mut items = make_items(*next_index, count, &[]);
            if sticky {
                items = items
                    .into_iter()
                    .map(|item| item.with_attributes(ItemAttributes::sticky()))
                    .collect();
            }
            *next_index += count;
            scheduler.insert_range_at(position, items)?;
        }
        ScriptOp::Remove { position, count } => scheduler.remove_range_at(position, count)?,
        ScriptOp::Move { from, to } => scheduler.move_item(from, to)?,
        ScriptOp::Update { position, count } => {
            let items = make_items(*next_index, count, &[]);
            *next_index += count;
            scheduler.update_range_at(position, items)?;
        }
        ScriptOp::Resize { width, height } => {
            scheduler.measure(Constraints::exact(width, height), None)?;
            scheduler.on_container_size_known(width, height)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("100x20"), Ok(Size::new(100, 20)));
        assert_eq!(parse_size(" 3 X 4 "), Ok(Size::new(3, 4)));
        assert!(parse_size("100").is_err());
        assert!(parse_size("ax20").is_err());
    }

    #[test]
    fn test_script_defaults() {
        let script: Script = serde_json::from_str(
            r#"{
                "viewport": {"width": 100, "height": 100},
                "item_size": {"width": 100, "height": 20},
                "initial_items": 10,
                "operations": [
                    {"op": "insert", "position": 2},
                    {"op": "scroll", "first": 1, "last": 3}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(script.scroll_axis, ScrollAxis::Vertical);
        assert!(matches!(script.layout, LayoutKind::Linear));
        assert!(matches!(
            script.operations[0],
            ScriptOp::Insert { position: 2, count: 1, sticky: false }
        ));
    }

    #[test]
    fn test_make_items_marks_sticky() {
        let items = make_items(0, 4, &[0, 2]);
        let sticky: Vec<bool> = items.iter().map(Item::is_sticky).collect();
        assert_eq!(sticky, vec![true, false, true, false]);
    }
}
