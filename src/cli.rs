//! Command-line front end for the statechart compiler.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scb_core::{CompileOptions, Compilation, Outcome, compile};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "scb")]
#[command(about = "Compiles statechart design files into Rust", version)]
pub struct Cli {
    /// Design file to compile
    #[arg(short, long)]
    pub design: PathBuf,

    /// Output file, defaults to <chart name>.rs next to the design
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override file with hand-written callbacks; wins over the design's InsertCB
    #[arg(short, long)]
    pub callbacks: Option<PathBuf>,

    /// Validate only and write nothing
    #[arg(long)]
    pub check: bool,

    /// Print the validated design model as JSON
    #[arg(long)]
    pub dump_model: bool,
}

impl Cli {
    pub fn compile_options(&self) -> CompileOptions {
        let mut options = CompileOptions::new(&self.design).check_only(self.check);
        if let Some(output) = &self.output {
            options = options.with_output(output);
        }
        if let Some(callbacks) = &self.callbacks {
            options = options.with_callbacks(callbacks);
        }
        options
    }
}

/// Compiles the design named on the command line.
pub fn run(cli: &Cli) -> Result<Compilation> {
    let compilation = match compile(&cli.compile_options()) {
        Outcome::Emitted(compilation) => compilation,
        Outcome::Aborted(aborted) => {
            let warnings = aborted.warnings.len();
            return Err(aborted)
                .with_context(|| format!("{} failed with {warnings} warning(s)", cli.design.display()));
        }
    };

    if !compilation.orphans.is_empty() {
        warn!(orphans = ?compilation.orphans, "override callbacks were not used");
    }
    if cli.dump_model {
        let json = serde_json::to_string_pretty(&compilation.model)
            .context("serializing the design model")?;
        println!("{json}");
    }
    if compilation.model.options.print {
        if let Some(source) = &compilation.source {
            println!("{source}");
        }
    }

    info!(
        chart = %compilation.model.name,
        warnings = compilation.warnings.len(),
        output = %compilation.output_path.display(),
        checked_only = cli.check,
        "done"
    );
    Ok(compilation)
}
