use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ferrite_sr::{RunLog, TestConfig, Tester, TrainConfig, Trainer};

#[derive(Parser)]
#[command(name = "ferrite-sr", version, about = "Train and test image super-resolution models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model, resuming from its checkpoint when configured to.
    Train {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Evaluate a trained model or the bicubic baseline on a test set.
    Test {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Train { config } => train(config),
        Command::Test { config } => test(config),
    }
}

fn train(path: PathBuf) -> Result<()> {
    let config = TrainConfig::load_json(&path)
        .with_context(|| format!("reading training config {}", path.display()))?;
    let log = RunLog::from_option(config.log_file.as_deref())?;
    let mut trainer = Trainer::new(config, log)?;
    let (mut train_loader, mut val_loader) = trainer.open_loaders()?;
    let state = trainer.train(&mut train_loader, &mut val_loader)?;
    println!(
        "finished at step {} (epoch {}), best val PSNR {:.2} dB / SSIM {:.4}",
        state.global_step, state.epoch, state.best.val_psnr, state.best.val_ssim
    );
    Ok(())
}

fn test(path: PathBuf) -> Result<()> {
    let config = TestConfig::load_json(&path)
        .with_context(|| format!("reading test config {}", path.display()))?;
    let log = RunLog::from_option(config.log_file.as_deref())?;
    let mut tester = Tester::new(config, log)?;
    let mut loader = tester.open_loader()?;
    let result = tester.run(&mut loader)?;
    println!(
        "{} samples: PSNR {:.2} dB, SSIM {:.4}",
        result.sample_count, result.average_psnr, result.average_ssim
    );
    Ok(())
}
