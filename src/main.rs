use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use world_composer::composition::Composition;
use world_composer::grid::{CellPlan, CellPlanSink};
use world_composer::render;
use world_composer::structures::templates::BuiltinTemplates;
use world_composer::world::{compose_world, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "world_composer")]
#[command(about = "Compose a hex world plan from a declarative composition document")]
struct Args {
    /// Path to the composition JSON document
    composition: PathBuf,

    /// Master seed (overrides the seed in the document)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Ocean border rings around the composed world
    #[arg(long, default_value = "2")]
    ocean_rings: u32,

    /// Skip the gap filling stage
    #[arg(long)]
    no_fill: bool,

    /// Write the resulting cell plans to this JSON file
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Render a PNG overview of the plan
    #[arg(short, long)]
    render: Option<PathBuf>,
}

/// Persistence collaborator writing cell plans as a JSON array.
struct JsonFileSink {
    path: PathBuf,
    written: usize,
}

impl CellPlanSink for JsonFileSink {
    fn store(&mut self, plans: &[CellPlan]) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(plans)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, text)?;
        self.written = plans.len();
        Ok(())
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let text = match fs::read_to_string(&args.composition) {
        Ok(text) => text,
        Err(err) => {
            error!("cannot read {}: {err}", args.composition.display());
            return ExitCode::FAILURE;
        }
    };
    let mut composition: Composition = match serde_json::from_str(&text) {
        Ok(composition) => composition,
        Err(err) => {
            error!("invalid composition document: {err}");
            return ExitCode::FAILURE;
        }
    };

    let config = RunConfig {
        seed: args.seed,
        fill_gaps: !args.no_fill,
        ocean_border_rings: args.ocean_rings,
        generate_cell_plans: args.out.is_some(),
        ..Default::default()
    };

    let mut sink = args.out.clone().map(|path| JsonFileSink { path, written: 0 });
    let templates = BuiltinTemplates::default();
    let result = compose_world(
        &mut composition,
        &config,
        &templates,
        sink.as_mut().map(|s| s as &mut dyn CellPlanSink),
    );

    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
    if !result.success {
        error!(
            "composition failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
        return ExitCode::FAILURE;
    }

    println!(
        "composed '{}' with seed {}: {} biomes, {} cells ({} filled), {} flows, {} segments",
        composition.name,
        result.seed,
        result.total_biomes,
        result.total_grids,
        result.filled_grids,
        result.total_flows,
        result.total_segments,
    );
    if let Some(sink) = &sink {
        println!("wrote {} cell plans to {}", sink.written, sink.path.display());
    }

    if let Some(path) = &args.render {
        match result.plan.as_ref() {
            Some(plan) => match render::render_plan(plan, path) {
                Ok(()) => println!("rendered plan to {}", path.display()),
                Err(err) => {
                    error!("render failed: {err}");
                    return ExitCode::FAILURE;
                }
            },
            None => {
                error!("no plan to render");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
