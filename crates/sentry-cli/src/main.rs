// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sentry_cli::{CliConfig, Script, ScriptRunner, COMPONENT};
use sentry_logging::CliLoggingArgs;
use sentry_syscalls::XattrSyscall;
use sentry_vfs::{FaultPolicy, FsCore};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replay extended-attribute syscalls against an in-memory sentry VFS"
)]
struct Cli {
    /// VFS and logging configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fault-injection policy (JSON) installed before the script runs
    #[arg(long)]
    fault_policy: Option<PathBuf>,

    #[command(flatten)]
    logging: CliLoggingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a JSON syscall script (use '-' for stdin) and print one line per step
    Run {
        #[arg(long)]
        script: PathBuf,
    },
    /// List the supported syscalls with their x86_64 numbers
    Syscalls,
    /// Print the effective VFS configuration as TOML
    ShowConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    cli.logging.with_config_defaults(&config.logging).init(COMPONENT)?;
    if let Some(path) = &cli.config {
        info!(path = %path.display(), "loaded config");
    }

    match cli.command {
        Command::Run { script } => {
            let script = read_script(&script)?;
            let core = FsCore::in_memory(config.fs);
            if let Some(path) = &cli.fault_policy {
                let policy = FaultPolicy::from_json_bytes(&read_input(path)?)
                    .with_context(|| format!("invalid fault policy {}", path.display()))?;
                println!(
                    "FAULT_POLICY enabled={} active={} rules={}",
                    policy.enabled,
                    policy.is_active(),
                    policy.rules.len()
                );
                core.set_fault_policy(policy);
            }

            let mut runner = ScriptRunner::new(&core)?;
            let report = runner.run(&script, &mut io::stdout().lock())?;
            let mismatches = report.mismatches();
            if mismatches > 0 {
                bail!("{mismatches} step(s) did not return what they expected");
            }
        }
        Command::Syscalls => {
            for call in XattrSyscall::ALL {
                println!("{}\t{}", call.number(), call.name());
            }
        }
        Command::ShowConfig => {
            print!("{}", toml::to_string_pretty(&config.fs)?);
        }
    }

    Ok(())
}

fn read_script(path: &Path) -> Result<Script> {
    if path == Path::new("-") {
        let text = String::from_utf8(read_input(path)?).context("script is not UTF-8")?;
        Script::from_json_str(&text)
    } else {
        Script::load(path)
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))
    }
}
