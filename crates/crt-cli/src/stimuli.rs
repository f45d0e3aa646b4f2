use anyhow::{Context, Result};
use clap::Args;
use crt_storage::{write_stimuli_js, StimulusManifest};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct StimuliArgs {
    /// Directory containing target images
    #[arg(long)]
    pub target_dir: PathBuf,
    /// Directory containing filler images
    #[arg(long)]
    pub filler_dir: Option<PathBuf>,
    #[arg(long)]
    pub output_dir: PathBuf,
}

pub fn run(args: StimuliArgs) -> Result<()> {
    let manifest = StimulusManifest::collect(&args.target_dir, args.filler_dir.as_deref())
        .context("failed to list stimulus images")?;
    let path = write_stimuli_js(&args.output_dir, &manifest)
        .with_context(|| format!("failed to write stimuli.js into {}", args.output_dir.display()))?;
    info!(
        targets = manifest.targets.len(),
        fillers = manifest.fillers.len(),
        path = %path.display(),
        "wrote stimulus manifest"
    );
    println!("stimuli.js file created at {}", path.display());
    Ok(())
}
