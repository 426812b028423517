use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use dbas_lang::cli::{Cli, Commands};
use dbas_lang::compile;
use dbas_lang::limits::Limits;
use dbas_lang::runtime::Runtime;

fn load_limits(config: Option<&Path>) -> Result<Limits> {
    let limits = match config {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} not found", path.display());
            }
            Limits::from_project_toml(path)?
        }
        None => Limits::from_project_toml("project.toml")?,
    };
    limits.validate()?;
    Ok(limits)
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init()?;

    let limits = load_limits(cli.config.as_deref())?;

    match cli.command {
        Commands::Parse(args) => {
            let source = read_source(&args.file)?;
            let program = compile(&source, &limits)?;
            print!("{}", program);
        }
        Commands::Run(args) => {
            let source = read_source(&args.file)?;
            let program = compile(&source, &limits)?;

            let mut runtime = Runtime::new(&program).with_limits(limits);
            let result = runtime.run();
            if args.show_state {
                eprint!("{}", runtime.state_summary());
            }
            let code = result?;
            log::info!(
                "{} exited with {} after {} steps",
                args.file.display(),
                code,
                runtime.steps()
            );
            if code != 0 {
                std::process::exit(code);
            }
        }
    }

    Ok(())
}
