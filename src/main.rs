use anyhow::{ensure, Result};
use clap::Parser;

use cutout_rs::{Config, CutoutProcessor, Mode, OnnxSegmentationModel, SegmentationProvider};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let log_level = if config.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    config.validate()?;

    let provider: Option<Box<dyn SegmentationProvider>> = match (config.mode, &config.model_path) {
        (Mode::Person, Some(model_path)) => Some(Box::new(OnnxSegmentationModel::new(
            model_path,
            config.device_id,
        )?)),
        _ => None,
    };

    let summary = CutoutProcessor::new(config, provider).process_input().await?;
    ensure!(
        summary.failed == 0,
        "{} of {} images failed",
        summary.failed,
        summary.total()
    );
    Ok(())
}
