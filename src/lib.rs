//! Command-line front end shared by `relay-send` and `relay-recv`.

use std::process::ExitCode;

use clap::Args;
use ffmpeg_relay::{Direction, RelayConfig, RelayReport, RelayTask};
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug, Clone, Default)]
pub struct RelayArgs {
    /// Input file or URL; ignored unless DESTINATION is also given
    #[arg(value_name = "SOURCE")]
    pub source: Option<String>,

    /// Output file or URL
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<String>,

    /// Force the demuxer instead of probing
    #[arg(long, value_name = "FORMAT")]
    pub input_format: Option<String>,

    /// Force the muxer instead of guessing from the destination
    #[arg(long, value_name = "FORMAT")]
    pub output_format: Option<String>,

    /// Demuxer/protocol option for the source, repeatable
    #[arg(long = "input-option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub input_options: Vec<(String, String)>,

    /// Muxer/protocol option for the destination, repeatable
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,
}

impl RelayArgs {
    pub fn into_config(self, direction: Direction) -> RelayConfig {
        let mut builder = RelayConfig::builder().direction(direction);
        match (&self.source, &self.destination) {
            (Some(source), Some(destination)) => {
                builder = builder.source(source).destination(destination);
            }
            (Some(source), None) => log::warn!(
                "'{}' given without a destination, using the built-in defaults",
                source
            ),
            _ => log::info!("no endpoints given, using the built-in defaults"),
        }
        if let Some(format) = &self.input_format {
            builder = builder.input_format(format);
        }
        match (&self.output_format, direction) {
            (Some(format), _) => builder = builder.output_format(format),
            // live delivery always goes out as FLV unless told otherwise
            (None, Direction::Send) => builder = builder.output_format("flv"),
            (None, Direction::Receive) => {}
        }
        for (key, value) in &self.input_options {
            builder = builder.input_option(key, value);
        }
        for (key, value) in &self.options {
            builder = builder.output_option(key, value);
        }
        builder.build()
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("ffmpeg_relay", log::LevelFilter::Info)
        .filter_module("lite_relay", log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Run one relay session, cancelling it on Ctrl-C.
pub async fn run(config: RelayConfig) -> anyhow::Result<RelayReport> {
    let task = RelayTask::new();
    let cancel: CancellationToken = task.cancel_token();

    let relay = task.run(config);
    tokio::pin!(relay);
    loop {
        tokio::select! {
            result = &mut relay => return result,
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted, stopping");
                cancel.cancel();
            },
        }
    }
}

/// End of stream and operator cancel are clean exits; everything else is not.
pub fn succeeded(result: &anyhow::Result<RelayReport>) -> bool {
    match result {
        Ok(report) => !report.stop.is_failure(),
        Err(_) => false,
    }
}

/// Entry point of both binaries.
pub async fn main_with(args: RelayArgs, direction: Direction) -> ExitCode {
    if let Err(e) = ffmpeg_relay::init() {
        eprintln!("Error occurred: {:#}", e);
        return ExitCode::FAILURE;
    }

    let config = args.into_config(direction);
    let result = run(config).await;
    match &result {
        Ok(report) if report.stop.is_failure() => {
            eprintln!("Error occurred: {:?}", report.stop)
        }
        Ok(report) => log::info!(
            "{} {} video frames, {} packets",
            direction.verb(),
            report.video_frames,
            report.packets_written
        ),
        Err(e) => eprintln!("Error occurred: {:#}", e),
    }

    if succeeded(&result) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
