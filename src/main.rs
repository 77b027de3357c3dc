// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use serde_json::{json, Value};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use the_slotflow::algorithms::AlgorithmFactory;
use the_slotflow::config::consts::DEFAULT_LOG_FILTER;
use the_slotflow::config::{load_and_validate_config, EngineConfig};
use the_slotflow::data::{DataSlot, ReadMode, TextData};
use the_slotflow::engine::{ProgressInfo, RunQueue, RunState};
use the_slotflow::graph::{GraphNode, NodeId, SlotRef};
use the_slotflow::project::Project;

const DEFAULT_CONFIG: &str = "configs/engine.yaml";
const DEFAULT_INPUT: &str = "hello dataflow world";

struct Args {
    config: Option<PathBuf>,
    export: Option<PathBuf>,
    input: String,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut config = None;
    let mut export = None;
    let mut words = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(PathBuf::from(
                    args.next().ok_or_else(|| anyhow!("--config needs a path"))?,
                ))
            }
            "--export" => {
                export = Some(PathBuf::from(
                    args.next().ok_or_else(|| anyhow!("--export needs a directory"))?,
                ))
            }
            _ => words.push(arg),
        }
    }
    let input = if words.is_empty() {
        DEFAULT_INPUT.to_string()
    } else {
        words.join(" ")
    };
    Ok(Args {
        config,
        export,
        input,
    })
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Installs the subscriber with `RUST_LOG` or the default filter. The handle
/// swaps in the configured filter once the config is read, unless `RUST_LOG`
/// was set.
fn init_logging() -> Option<FilterHandle> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let overridden = from_env.is_some();
    let (filter, handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
    (!overridden).then_some(handle)
}

fn load_engine_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => load_and_validate_config(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            Ok(load_and_validate_config(DEFAULT_CONFIG)?)
        }
        None => {
            let config = EngineConfig::default();
            config.log_loaded(None);
            Ok(config)
        }
    }
}

/// Builds `words -> upper`, `words -> title`, and joins both branches by word
/// position.
fn build_project(config: &EngineConfig, input: &str) -> anyhow::Result<(Project, NodeId)> {
    let rows: Vec<Value> = input
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| json!({ "text": word, "annotations": { "#Position": i.to_string() } }))
        .collect();

    let create = |name: &str| AlgorithmFactory::create(name).map_err(|e| anyhow!(e));

    let mut project = Project::from_config("demo", config);
    let words = project.add_node(
        GraphNode::new("words", create("source_text")?).with_parameter("rows", Value::Array(rows)),
    )?;
    let upper = project
        .add_node(GraphNode::new("upper", create("change_text_case_upper")?).with_parallel_steps(true))?;
    let title = project.add_node(GraphNode::new("title", create("change_text_case_title")?))?;
    let join = project.add_node(GraphNode::new("join", create("join_text")?))?;

    project.connect(SlotRef::new(words, "Output"), SlotRef::new(upper, "Input"))?;
    project.connect(SlotRef::new(words, "Output"), SlotRef::new(title, "Input"))?;
    project.connect(SlotRef::new(upper, "Output"), SlotRef::new(join, "Left"))?;
    project.connect(SlotRef::new(title, "Output"), SlotRef::new(join, "Right"))?;
    project.set_parameter(join, "separator", json!(" / "))?;
    Ok((project, join))
}

fn print_slot(slot: &DataSlot) {
    for (row, data) in slot.rows().iter().enumerate() {
        let text = slot
            .data(row, ReadMode::Share)
            .ok()
            .and_then(|item| item.downcast_ref::<TextData>().map(|t| t.text().to_string()))
            .unwrap_or_default();
        let annotations: Vec<String> = data
            .annotations
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        println!("  [{}] {:<30} {}", row, text, annotations.join(", "));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = init_logging();
    let args = parse_args()?;
    let config = load_engine_config(args.config.as_deref())?;
    if let Some(filter) = filter {
        filter
            .reload(EnvFilter::new(config.logging.get_filter()))
            .context("Failed to apply the configured log filter")?;
    }

    println!("🚀 Slotflow Demo");
    println!("═══════════════════════════════════");
    println!("Input: \"{}\"", args.input);
    println!();

    let (project, join) = build_project(&config, &args.input)?;
    let queue = RunQueue::start(config.queue_options());

    let mut progress = queue.subscribe_progress();
    let printer = tokio::spawn(async move {
        while let Ok(event) = progress.recv().await {
            if !event.message.is_empty() {
                println!("  {} | {}", event.path, event.message);
            }
        }
    });

    let (id, outputs) = project.submit_with_outputs(&queue)?;
    let state = queue.wait(id).await?;
    printer.abort();

    match state {
        RunState::Finished => {}
        RunState::Interrupted(reason) => bail!("Run {} was interrupted: {}", id, reason),
        other => bail!("Run {} ended in unexpected state {}", id, other),
    }

    let outputs = outputs.await.context("Run finished without outputs")?;
    let joined = outputs
        .get(join, "Joined")
        .ok_or_else(|| anyhow!("Join node produced no output"))?;

    println!();
    println!("✅ {} finished ({} node(s) executed)", id, outputs.executed().len());
    print_slot(joined);

    if let Some(dir) = args.export {
        let exported = project.export_cached(join, "Joined", &dir, &ProgressInfo::detached())?;
        if exported {
            println!("\n📦 Exported joined rows to {}", dir.display());
        }
    }

    queue.shutdown().await?;
    Ok(())
}
