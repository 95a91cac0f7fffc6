//! Relay session configuration.

/// Send pushes a local source to a live destination at real-time speed;
/// Receive saves a live source as fast as it arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

impl Direction {
    pub fn verb(&self) -> &'static str {
        match self {
            Direction::Send => "Send",
            Direction::Receive => "Receive",
        }
    }
}

pub const DEFAULT_SEND_SOURCE: &str = "data/cuc_ieschool.flv";
pub const DEFAULT_SEND_DESTINATION: &str = "rtmp://localhost/publishlive/livestream";
pub const DEFAULT_RECEIVE_SOURCE: &str = "rtmp://live.hkstv.hk.lxdns.com/live/hks";
pub const DEFAULT_RECEIVE_DESTINATION: &str = "receive.flv";

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub source: String,
    pub destination: String,
    pub direction: Direction,
    /// Demuxer name, None = probe.
    pub input_format: Option<String>,
    /// Muxer name, None = guess from the destination.
    pub output_format: Option<String>,
    pub input_options: Vec<(String, String)>,
    /// Protocol and muxer options for the destination.
    pub output_options: Vec<(String, String)>,
}

impl RelayConfig {
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }

    pub fn send_defaults() -> Self {
        Self::builder()
            .source(DEFAULT_SEND_SOURCE)
            .destination(DEFAULT_SEND_DESTINATION)
            .direction(Direction::Send)
            .build()
    }

    pub fn receive_defaults() -> Self {
        Self::builder()
            .source(DEFAULT_RECEIVE_SOURCE)
            .destination(DEFAULT_RECEIVE_DESTINATION)
            .direction(Direction::Receive)
            .build()
    }

    /// Only outbound live delivery is throttled to wall-clock time.
    pub fn paced(&self) -> bool {
        self.direction == Direction::Send
    }
}

/// Muxer implied by a streaming URL scheme, if any.
pub fn format_for_url(url: &str) -> Option<&'static str> {
    let scheme = url.split_once("://")?.0.to_ascii_lowercase();
    match scheme.as_str() {
        "rtmp" | "rtmps" | "rtmpt" | "rtmpe" => Some("flv"),
        "rtsp" | "rtsps" => Some("rtsp"),
        "udp" | "srt" | "rtp" => Some("mpegts"),
        _ => None,
    }
}

#[derive(Default)]
pub struct RelayConfigBuilder {
    source: Option<String>,
    destination: Option<String>,
    direction: Option<Direction>,
    input_format: Option<String>,
    output_format: Option<String>,
    input_options: Vec<(String, String)>,
    output_options: Vec<(String, String)>,
}

impl RelayConfigBuilder {
    pub fn source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn destination(mut self, destination: &str) -> Self {
        self.destination = Some(destination.to_string());
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn input_format(mut self, format: &str) -> Self {
        self.input_format = Some(format.to_string());
        self
    }

    pub fn output_format(mut self, format: &str) -> Self {
        self.output_format = Some(format.to_string());
        self
    }

    pub fn input_option(mut self, key: &str, value: &str) -> Self {
        self.input_options.push((key.to_string(), value.to_string()));
        self
    }

    pub fn output_option(mut self, key: &str, value: &str) -> Self {
        self.output_options.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> RelayConfig {
        let direction = self.direction.unwrap_or(Direction::Send);
        let (default_source, default_destination) = match direction {
            Direction::Send => (DEFAULT_SEND_SOURCE, DEFAULT_SEND_DESTINATION),
            Direction::Receive => (DEFAULT_RECEIVE_SOURCE, DEFAULT_RECEIVE_DESTINATION),
        };
        let source = self.source.unwrap_or_else(|| default_source.to_string());
        let destination = self
            .destination
            .unwrap_or_else(|| default_destination.to_string());

        // file destinations keep the muxer guessed from the extension
        let output_format = self
            .output_format
            .or_else(|| format_for_url(&destination).map(str::to_string));

        let mut output_options = self.output_options;
        // RTSP output often needs rtsp_transport=tcp for avio_open2 to succeed
        if output_format.as_deref() == Some("rtsp")
            && !output_options.iter().any(|(k, _)| k == "rtsp_transport")
        {
            output_options.push(("rtsp_transport".to_string(), "tcp".to_string()));
        }

        RelayConfig {
            source,
            destination,
            direction,
            input_format: self.input_format,
            output_format,
            input_options: self.input_options,
            output_options,
        }
    }
}
