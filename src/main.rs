//! Script Node - Command Line Entry Point
//!
//! Checks node scripts outside a host, prints their port lists and the
//! built-in templates.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use scriptable_node::config::NodeConfig;
use scriptable_node::node::{PortKind, PortList};
use scriptable_node::scripting::builtins;
use scriptable_node::{validate, AudioBuffer, MidiPipe, ScriptNode};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,scriptable_node=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check(args) => execute_check(args),
        Commands::Ports(args) => execute_ports(args),
        Commands::Template { name } => execute_template(name.as_deref()),
    }
}

#[derive(Parser)]
#[command(author, version, about = "Tools for scriptable audio node scripts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a script and render it for a few blocks of silence.
    Check(CheckArgs),
    /// Print the ports a script declares.
    Ports(PortsArgs),
    /// Print a built-in script, or list them when no name is given.
    Template {
        /// Name of the built-in script.
        name: Option<String>,
    },
}

#[derive(Args)]
struct CheckArgs {
    /// Path to the script.
    script: PathBuf,
    /// Config file to use instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of blocks to render after validation.
    #[arg(long, default_value_t = 16)]
    blocks: usize,
}

#[derive(Args)]
struct PortsArgs {
    /// Path to the script.
    script: PathBuf,
    /// Print the port list as JSON.
    #[arg(long)]
    json: bool,
}

fn read_script(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read script {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<NodeConfig> {
    match path {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(NodeConfig::load_or_default()),
    }
}

fn execute_check(args: CheckArgs) -> Result<()> {
    let source = read_script(&args.script)?;
    let config = load_config(args.config.as_deref())?;

    validate(&source, &config.validation, &config.limits)
        .with_context(|| format!("{} failed validation", args.script.display()))?;

    let node = ScriptNode::with_config(config.clone());
    node.load_script(&source)?;
    node.create_ports();
    let ports = node.ports();

    let block_size = config.validation.block_size;
    let mut audio = AudioBuffer::new(ports.max_channels(PortKind::Audio).max(1), block_size);
    let mut midi = MidiPipe::with_streams(ports.max_channels(PortKind::Midi));

    node.prepare_to_render(config.validation.sample_rate, block_size)?;
    for block in 0..args.blocks {
        audio.clear();
        midi.clear();
        node.render(&mut audio, &mut midi)
            .with_context(|| format!("render failed on block {}", block))?;
    }
    node.release_resources()?;

    println!(
        "{}: OK ({} blocks of {} frames)",
        args.script.display(),
        args.blocks,
        block_size
    );
    print_ports(&ports);
    Ok(())
}

fn execute_ports(args: PortsArgs) -> Result<()> {
    let source = read_script(&args.script)?;
    let node = ScriptNode::new();
    node.load_script(&source)
        .with_context(|| format!("{} failed validation", args.script.display()))?;
    node.create_ports();
    let ports = node.ports();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
    } else {
        print_ports(&ports);
    }
    Ok(())
}

fn execute_template(name: Option<&str>) -> Result<()> {
    let Some(name) = name else {
        for (name, _) in builtins::all() {
            println!("{}", name);
        }
        return Ok(());
    };
    match builtins::get(name) {
        Some(source) => {
            print!("{}", source);
            Ok(())
        }
        None => bail!("unknown template '{}'", name),
    }
}

fn print_ports(ports: &PortList) {
    println!("{:>5}  {:>7}  {:<8} {:<6} {:<16} NAME", "INDEX", "CHANNEL", "KIND", "DIR", "SYMBOL");
    for port in ports {
        let kind = match port.kind {
            PortKind::Audio => "audio",
            PortKind::Midi => "midi",
            PortKind::Control => "control",
        };
        let direction = if port.is_input() { "in" } else { "out" };
        let mut line = format!(
            "{:>5}  {:>7}  {:<8} {:<6} {:<16} {}",
            port.index, port.channel, kind, direction, port.symbol, port.name
        );
        if let Some(range) = &port.control {
            line.push_str(&format!(
                " [{} .. {}, default {}] {}",
                range.min, range.max, range.default, range.label
            ));
        }
        println!("{}", line.trim_end());
    }
}
