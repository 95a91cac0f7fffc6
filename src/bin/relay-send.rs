use std::process::ExitCode;

use clap::Parser;
use ffmpeg_relay::Direction;
use lite_relay::RelayArgs;

#[derive(Parser, Debug)]
#[command(name = "relay-send")]
#[command(about = "Push a local file or stream to a live destination in real time, without transcoding")]
#[command(after_help = "Examples:\n  relay-send cuc_ieschool.flv rtmp://localhost/publishlive/livestream\n  relay-send input.mp4 rtsp://localhost:8554/live --output-format rtsp\n  relay-send input.h264 udp://233.233.233.223:6666 --output-format mpegts")]
struct Cli {
    #[command(flatten)]
    relay: RelayArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    lite_relay::init_logging();
    lite_relay::main_with(cli.relay, Direction::Send).await
}
