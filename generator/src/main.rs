use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use sgen::context::GenerationContext;
use sgen::pipeline::{analyze, compute_provenance, register_requests};
use sgen::registry::BuildRegistry;

#[derive(Parser, Debug)]
#[command(
    name = "sgen",
    version,
    about = "Stencil glue generator: renders sweep and halo pack-info classes from .sgen scripts"
)]
struct Cli {
    /// Input .sgen generation script
    script: PathBuf,

    /// Print the ';'-separated list of files that would be generated
    #[arg(short = 'l', long)]
    list_output_files: bool,

    /// Render every registered artifact and write it
    #[arg(short = 'g', long)]
    generate: bool,

    /// Output directory for generated files
    #[arg(short = 'o', long, default_value = ".")]
    out_dir: PathBuf,

    /// Generation context as JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use float instead of double
    #[arg(long)]
    single_precision: bool,

    /// Parallelize host loops with OpenMP
    #[arg(long)]
    openmp: bool,

    /// Skip accelerator (gpu) requests
    #[arg(long)]
    no_cuda: bool,

    /// Log generation steps
    #[arg(long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.list_output_files && !cli.generate {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    }

    // ── Generation context ──
    let mut ctx = match &cli.config {
        Some(path) => match GenerationContext::load(path) {
            Ok(ctx) => ctx,
            Err(e) => {
                eprintln!("sgen: error: {}", e);
                return ExitCode::from(2);
            }
        },
        None => GenerationContext::default(),
    };
    if cli.single_precision {
        ctx.double_accuracy = false;
    }
    if cli.openmp {
        ctx.openmp = true;
    }
    if cli.no_cuda {
        ctx.cuda = false;
    }

    // ── Read and analyze script ──
    let source = match std::fs::read_to_string(&cli.script) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("sgen: error: {}: {}", cli.script.display(), e);
            return ExitCode::from(2);
        }
    };

    let front = analyze(&source);
    let path = cli.script.display().to_string();
    for diag in &front.diagnostics {
        eprintln!("{}", diag.render(&path, &source));
    }
    let errors = front.error_count();
    let Some(script) = front.resolved else {
        eprintln!("sgen: {} error(s), nothing generated", errors);
        return ExitCode::from(1);
    };

    // ── Register and run ──
    let provenance = compute_provenance(&source, &ctx);
    let mut registry = BuildRegistry::new();
    if let Err(e) = register_requests(&mut registry, &script, &ctx, &provenance) {
        eprintln!("sgen: error: {}", e);
        return ExitCode::from(2);
    }

    if cli.list_output_files {
        println!("{}", registry.list_output_files());
    }
    if cli.generate {
        match registry.generate(&cli.out_dir) {
            Ok(written) => tracing::info!(count = written.len(), "generation finished"),
            Err(e) => {
                eprintln!("sgen: error: {}", e);
                return ExitCode::from(2);
            }
        }
    }
    ExitCode::SUCCESS
}
