//! Boundary with the container I/O library.
//!
//! The session only talks to demuxers and muxers through these traits;
//! [`FfmpegIo`] is the production implementation on top of libavformat.

use ffmpeg_next::{Dictionary, Rational, codec::Parameters};

use crate::{input::AvInput, output::AvOutput, packet::RawPacket, stream::AvStream};

/// An opened, probed demuxer.
pub trait ContainerSource {
    /// Demuxer name, e.g. "flv".
    fn format_name(&self) -> &str;

    /// Streams found while probing, in index order.
    fn streams(&self) -> &[AvStream];

    /// Next packet, `Ok(None)` at end of stream.
    fn read_packet(&mut self) -> anyhow::Result<Option<RawPacket>>;

    /// Release the demuxer. Calling it again is a no-op.
    fn close(&mut self);
}

/// A muxer context for the destination.
pub trait ContainerSink {
    fn format_name(&self) -> &str;

    /// The muxer wants codec setup data once in the header instead of in-band.
    fn requires_global_header(&self) -> bool;

    /// The muxer writes through an I/O handle the caller must open.
    fn requires_io(&self) -> bool;

    /// The muxer rejects a DTS equal to the previous one on a stream.
    fn strict_timestamps(&self) -> bool;

    /// Declare an output stream with `parameters`; returns its index.
    fn add_stream(&mut self, parameters: &Parameters) -> anyhow::Result<usize>;

    fn open_io(&mut self, options: &[(String, String)]) -> anyhow::Result<()>;

    fn write_header(&mut self, options: &[(String, String)]) -> anyhow::Result<()>;

    /// Time base of output stream `index`; final only once the header is written.
    fn stream_time_base(&self, index: usize) -> Option<Rational>;

    /// Interleaved write of one packet already rescaled to its output stream.
    fn write_packet(&mut self, packet: &mut RawPacket) -> anyhow::Result<()>;

    fn write_trailer(&mut self) -> anyhow::Result<()>;

    /// Close the I/O handle (if opened) and free the muxer. Idempotent.
    fn close(&mut self);
}

/// Factory for both ends of a relay.
pub trait ContainerIo {
    type Source: ContainerSource;
    type Sink: ContainerSink;

    fn open_source(
        &self,
        url: &str,
        format: Option<&str>,
        options: &[(String, String)],
    ) -> anyhow::Result<Self::Source>;

    fn create_sink(&self, url: &str, format: Option<&str>) -> anyhow::Result<Self::Sink>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegIo;

impl ContainerIo for FfmpegIo {
    type Source = AvInput;
    type Sink = AvOutput;

    fn open_source(
        &self,
        url: &str,
        format: Option<&str>,
        options: &[(String, String)],
    ) -> anyhow::Result<AvInput> {
        let options = (!options.is_empty()).then(|| to_dictionary(options));
        AvInput::new(url, format, options)
    }

    fn create_sink(&self, url: &str, format: Option<&str>) -> anyhow::Result<AvOutput> {
        AvOutput::new(url, format)
    }
}

pub(crate) fn to_dictionary(options: &[(String, String)]) -> Dictionary<'static> {
    let mut dictionary = Dictionary::new();
    for (key, value) in options {
        dictionary.set(key, value);
    }
    dictionary
}
