//! Human-readable stream layout of either end of a relay, logged after the
//! input is probed and after the output streams are declared.

use std::fmt;

use ffmpeg_next::Rational;

use crate::{error::Endpoint, negotiate::StreamMapping, stream::AvStream};

#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub index: usize,
    /// "video" | "audio" | "data" etc.
    pub codec_type: String,
    pub codec_name: String,
    pub codec_tag: u32,
    pub time_base: Rational,
    /// Nominal frame rate, 0/1 when unknown.
    pub rate: Rational,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

impl StreamInfo {
    fn describe(stream: &AvStream) -> Self {
        let (width, height, sample_rate, channels) = if stream.is_video() {
            (Some(stream.width()), Some(stream.height()), None, None)
        } else if stream.is_audio() {
            (None, None, Some(stream.sample_rate()), Some(stream.channels()))
        } else {
            (None, None, None, None)
        };
        Self {
            index: stream.index(),
            codec_type: format!("{:?}", stream.medium()).to_lowercase(),
            codec_name: format!("{:?}", stream.parameters().id()).to_lowercase(),
            codec_tag: stream.codec_tag(),
            time_base: stream.time_base(),
            rate: stream.rate(),
            width,
            height,
            sample_rate,
            channels,
        }
    }
}

/// Format plus per-stream layout, like a short ffprobe dump.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub endpoint: Endpoint,
    pub url: String,
    pub format_name: String,
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    pub fn from_streams(endpoint: Endpoint, url: &str, format_name: &str, streams: &[AvStream]) -> Self {
        Self {
            endpoint,
            url: url.to_string(),
            format_name: format_name.to_string(),
            streams: streams.iter().map(StreamInfo::describe).collect(),
        }
    }

    /// Output side as declared: input codec with the output tag and time base.
    pub fn from_mappings(url: &str, format_name: &str, mappings: &[StreamMapping]) -> Self {
        let streams = mappings
            .iter()
            .map(|m| {
                let mut info = StreamInfo::describe(m.input());
                info.index = m.output_index();
                info.codec_tag = crate::stream::codec_tag(m.output_parameters());
                info.time_base = m.output_time_base();
                info
            })
            .collect();
        Self {
            endpoint: Endpoint::Output,
            url: url.to_string(),
            format_name: format_name.to_string(),
            streams,
        }
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} '{}' format={} nb_streams={}",
            self.endpoint,
            self.url,
            self.format_name,
            self.streams.len()
        )?;
        for s in &self.streams {
            write!(
                f,
                "  #{} {} {} tag=0x{:08x} time_base={}/{}",
                s.index,
                s.codec_type,
                s.codec_name,
                s.codec_tag,
                s.time_base.numerator(),
                s.time_base.denominator()
            )?;
            if s.rate.numerator() > 0 {
                write!(f, " rate={}/{}", s.rate.numerator(), s.rate.denominator())?;
            }
            if let (Some(w), Some(h)) = (s.width, s.height) {
                write!(f, " {}x{}", w, h)?;
            }
            if let Some(sr) = s.sample_rate {
                write!(f, " {}Hz", sr)?;
            }
            if let Some(c) = s.channels {
                write!(f, " channels={}", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_io::{AVC1, audio_stream, video_stream};

    #[test]
    fn test_input_dump() {
        let streams = vec![
            video_stream(0, Rational(1, 1000), Rational(25, 1)),
            audio_stream(1, Rational(1, 44100)),
        ];
        let info = MediaInfo::from_streams(Endpoint::Input, "in.flv", "flv", &streams);
        assert_eq!(info.streams.len(), 2);
        assert_eq!(info.streams[0].codec_type, "video");
        assert_eq!(info.streams[0].codec_name, "h264");
        assert_eq!(info.streams[0].codec_tag, AVC1);
        assert_eq!(info.streams[1].codec_type, "audio");
        assert_eq!(info.streams[1].width, None);

        let text = info.to_string();
        assert!(text.starts_with("input 'in.flv' format=flv nb_streams=2"));
        assert!(text.contains("#0 video h264"));
        assert!(text.contains("rate=25/1"));
        assert!(text.contains("#1 audio aac"));
        assert!(!text.lines().nth(2).unwrap_or_default().contains("rate="));
    }
}
