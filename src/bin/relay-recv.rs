use std::process::ExitCode;

use clap::Parser;
use ffmpeg_relay::Direction;
use lite_relay::RelayArgs;

#[derive(Parser, Debug)]
#[command(name = "relay-recv")]
#[command(about = "Save a live stream to a local file as fast as it arrives, without transcoding")]
#[command(after_help = "Examples:\n  relay-recv rtmp://live.hkstv.hk.lxdns.com/live/hks receive.flv\n  relay-recv rtsp://camera/stream capture.mkv --input-option rtsp_transport=tcp")]
struct Cli {
    #[command(flatten)]
    relay: RelayArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    lite_relay::init_logging();
    lite_relay::main_with(cli.relay, Direction::Receive).await
}
