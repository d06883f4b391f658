use std::path::PathBuf;

use anyhow::Context;
use chipsim::config::Config;
use chipsim::import::{export_bundle, import};
use chipsim::issues::Diagnostic;
use chipsim::persist::SaveDir;
use chipsim::{
    builtin_chips, get_all_saved_chips, load_all, ChipKind, LoadEvent, LoadOutcome, Signal,
    Simulation,
};
use clap::{Parser as ClapParser, Subcommand};
use itertools::Itertools;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config =
        Config::load(args.config.as_deref()).with_context(|| "Failed to load configuration.")?;
    if let Some(save_dir) = args.save_dir {
        config.save_dir = save_dir;
    }
    info!(save_dir = ?config.save_dir, "using save directory");

    chiptool(args.command, &config)
}

/// Arguments to `chiptool`.
#[derive(ClapParser)]
#[command(
    version,
    about,
    long_about = "Load, inspect, simulate and exchange saved logic chips"
)]
pub struct Args {
    /// Increases log verbosity. May be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// The configuration file.
    ///
    /// If unspecified, `chiptool.toml` in the working directory is used if it exists.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Overrides the save directory from the configuration.
    #[arg(short, long)]
    save_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Loads every saved chip and reports chips that failed.
    Load,
    /// Checks saved chips for problems without loading them.
    Validate,
    /// Prints the interface and components of a chip.
    Show {
        /// The chip name.
        chip: String,
    },
    /// Simulates a chip until its outputs settle.
    Run {
        /// The chip name.
        chip: String,
        /// Input values, in interface order. Missing inputs are undriven.
        inputs: Vec<u64>,
    },
    /// Imports a chip bundle, renaming chips whose names are taken.
    Import {
        /// The bundle file.
        bundle: PathBuf,
    },
    /// Exports saved chips as a bundle.
    Export {
        /// The path where the bundle should be saved.
        ///
        /// If unspecified, the bundle is written to stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// The chips to export.
        #[arg(required = true)]
        chips: Vec<String>,
    },
}

fn load(saves: &SaveDir) -> anyhow::Result<LoadOutcome> {
    let store = get_all_saved_chips(saves).with_context(|| "Failed to read saved chips.")?;
    Ok(load_all(&store, builtin_chips(), |event, progress| {
        if let LoadEvent::ChipLoaded { name } = event {
            info!(chip = %name, done = progress.done, total = progress.total, "loaded chip");
        }
    }))
}

/// Runs a `chiptool` command.
fn chiptool(command: Command, config: &Config) -> anyhow::Result<()> {
    let mut saves = SaveDir::from_config(config);

    match command {
        Command::Load => {
            let outcome = load(&saves)?;
            print!("{}", outcome.report);
            if !outcome.report.is_success() {
                anyhow::bail!("One or more chips failed to load.");
            }
        }
        Command::Validate => {
            let store = get_all_saved_chips(&saves).with_context(|| "Failed to read saved chips.")?;
            let issues = store.validate(&builtin_chips());
            for item in issues.iter() {
                eprintln!("{item}");
                if let Some(help) = item.help() {
                    eprintln!("  help: {help}");
                }
            }
            if issues.has_error() {
                anyhow::bail!("One or more errors in saved chips identified.");
            }
            println!("{} chips checked, {} warnings", store.len(), issues.num_warnings());
        }
        Command::Show { chip } => {
            let outcome = load(&saves)?;
            let chip = outcome
                .chips
                .get(&chip)
                .with_context(|| format!("No loaded chip named `{chip}`."))?;
            let pins = |pins: &[chipsim::PinSpec]| {
                pins.iter().map(|p| format!("{}[{}]", p.name, p.width)).join(", ")
            };
            println!("{}", chip.name);
            println!("  inputs: {}", pins(&chip.inputs));
            println!("  outputs: {}", pins(&chip.outputs));
            match &chip.kind {
                ChipKind::Primitive(p) => println!("  builtin: {p}"),
                ChipKind::Composite(c) => {
                    for (i, component) in c.components().iter().enumerate() {
                        println!("  {i}: {}", component.chip.name);
                    }
                    println!("  {} wires", c.wires().len());
                }
            }
        }
        Command::Run { chip, inputs } => {
            let outcome = load(&saves)?;
            let chip = outcome
                .chips
                .get(&chip)
                .with_context(|| format!("No loaded chip named `{chip}`."))?
                .clone();
            let widths: Vec<usize> = chip.inputs.iter().map(|p| p.width).collect();
            let mut sim = Simulation::new(chip);
            for (i, value) in inputs.into_iter().enumerate() {
                let width = widths.get(i).copied().unwrap_or(1);
                sim.set_input(i, Signal::from_u64(value, width))?;
            }
            let outputs = sim
                .settle(config.max_settle_cycles)
                .with_context(|| "Simulation did not settle.")?
                .to_vec();
            for (pin, value) in sim.chip().outputs.iter().zip(outputs) {
                println!("{} = {value}", pin.name);
            }
        }
        Command::Import { bundle } => {
            let report = import(&bundle, &mut saves)
                .with_context(|| format!("Failed to import bundle {:?}.", bundle))?;
            for chip in report.imported.iter() {
                if chip.original == chip.name {
                    println!("imported {}", chip.name);
                } else {
                    println!("imported {} as {}", chip.original, chip.name);
                }
            }
        }
        Command::Export { out, chips } => {
            let bundle = export_bundle(&chips, &saves).with_context(|| "Failed to export chips.")?;
            if let Some(path) = out {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create directory {:?}.", parent))?;
                }
                std::fs::write(&path, bundle)
                    .with_context(|| format!("Failed to write bundle to {:?}.", path))?;
            } else {
                print!("{bundle}");
            }
        }
    }

    Ok(())
}
