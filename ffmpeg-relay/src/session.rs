//! The relay session: open both ends, declare the output streams, write the
//! header, then copy packets until the source ends, fails or is cancelled.

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::{
    config::RelayConfig,
    container::{ContainerIo, ContainerSink, ContainerSource},
    error::{Endpoint, RelayError, Result},
    metadata::MediaInfo,
    negotiate::{StreamMapping, negotiate},
    pacer::{Clock, Pace, Pacer, SystemClock},
    packet::RawPacket,
    timestamp::TimestampSynthesizer,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Opened,
    Negotiated,
    HeaderWritten,
    Streaming,
    Finalizing,
    Closed,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why the packet loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
    ReadError(String),
    MuxError(String),
}

impl StopReason {
    /// The loop ended on an I/O failure rather than on its own.
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::ReadError(_) | StopReason::MuxError(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayReport {
    pub packets_read: u64,
    pub packets_written: u64,
    /// Packets read but never written: unknown stream, failed write, or
    /// cancelled while held back.
    pub packets_dropped: u64,
    /// Packets written on the primary stream.
    pub video_frames: u64,
    pub stop: StopReason,
}

pub struct Session<Io: ContainerIo, C: Clock = SystemClock> {
    config: RelayConfig,
    state: SessionState,
    source: Option<Io::Source>,
    sink: Option<Io::Sink>,
    io_opened: bool,
    mappings: Vec<StreamMapping>,
    /// Input index of the first video stream; the only stream paced.
    primary: Option<usize>,
    synthesizer: TimestampSynthesizer,
    pacer: Pacer<C>,
    packets_read: u64,
    packets_written: u64,
    packets_dropped: u64,
    video_frames: u64,
}

impl<Io: ContainerIo, C: Clock> Session<Io, C> {
    pub fn new(config: RelayConfig, clock: C) -> Self {
        Self {
            config,
            state: SessionState::Init,
            source: None,
            sink: None,
            io_opened: false,
            mappings: Vec::new(),
            primary: None,
            synthesizer: TimestampSynthesizer::new(),
            pacer: Pacer::new(clock),
            packets_read: 0,
            packets_written: 0,
            packets_dropped: 0,
            video_frames: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn mappings(&self) -> &[StreamMapping] {
        &self.mappings
    }

    pub fn primary_stream(&self) -> Option<usize> {
        self.primary
    }

    /// The destination needed, and got, its own I/O handle.
    pub fn io_opened(&self) -> bool {
        self.io_opened
    }

    /// Run the session to completion. Soft stops (end of stream, cancel,
    /// read or mux failure) are reported through [`RelayReport::stop`] after
    /// the trailer is written; setup failures return the stage error. Either
    /// way every handle is closed before returning.
    pub fn run(&mut self, io: &Io, cancel: &CancellationToken) -> Result<RelayReport> {
        if self.state != SessionState::Init {
            return Err(RelayError::AlreadyRun(self.state.to_string()));
        }

        if let Err(e) = self.prepare(io) {
            log::error!("{}", e);
            self.transition(SessionState::Error);
            self.close();
            return Err(e);
        }

        if self.config.paced() {
            self.pacer.start();
        }
        self.transition(SessionState::Streaming);
        let stop = self.pump(cancel);
        match &stop {
            StopReason::EndOfStream => log::info!("end of stream"),
            StopReason::Cancelled => log::info!("relay cancelled"),
            StopReason::ReadError(reason) | StopReason::MuxError(reason) => {
                log::error!("{}", reason)
            }
        }

        self.transition(SessionState::Finalizing);
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.write_trailer() {
                log::error!("failed to write trailer to '{}': {:#}", self.config.destination, e);
            }
        }
        self.close();

        let report = RelayReport {
            packets_read: self.packets_read,
            packets_written: self.packets_written,
            packets_dropped: self.packets_dropped,
            video_frames: self.video_frames,
            stop,
        };
        log::info!(
            "{} finished: read {} written {} dropped {} ({:?})",
            self.config.direction.verb(),
            report.packets_read,
            report.packets_written,
            report.packets_dropped,
            report.stop
        );
        Ok(report)
    }

    /// Release every handle. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        if let Some(mut sink) = self.sink.take() {
            sink.close();
        }
        if self.state != SessionState::Closed {
            self.transition(SessionState::Closed);
        }
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("session {} -> {}", self.state, next);
        self.state = next;
    }

    /// Init through HeaderWritten.
    fn prepare(&mut self, io: &Io) -> Result<()> {
        let config = &self.config;
        let source = io
            .open_source(
                &config.source,
                config.input_format.as_deref(),
                &config.input_options,
            )
            .map_err(|e| RelayError::open(Endpoint::Input, &config.source, e))?;
        log::info!(
            "{}",
            MediaInfo::from_streams(
                Endpoint::Input,
                &config.source,
                source.format_name(),
                source.streams()
            )
        );
        self.primary = source
            .streams()
            .iter()
            .find(|s| s.is_video())
            .map(|s| s.index());
        if self.primary.is_none() {
            log::warn!("no video stream in '{}', nothing will be paced", config.source);
        }
        let streams = source.streams().to_vec();
        self.source = Some(source);
        self.transition(SessionState::Opened);

        let config = &self.config;
        let mut sink = io
            .create_sink(&config.destination, config.output_format.as_deref())
            .map_err(|e| RelayError::open(Endpoint::Output, &config.destination, e))?;
        let negotiated = negotiate(&streams, &mut sink);
        self.sink = Some(sink);
        self.mappings = negotiated?;
        self.transition(SessionState::Negotiated);

        if let Some(sink) = self.sink.as_mut() {
            self.io_opened = write_header(sink, &self.config, &mut self.mappings)?;
        }
        self.transition(SessionState::HeaderWritten);
        Ok(())
    }

    /// Packet loop. Returns once the source is exhausted, cancellation is
    /// observed, or a read or write fails.
    fn pump(&mut self, cancel: &CancellationToken) -> StopReason {
        let verb = self.config.direction.verb();
        let paced = self.config.paced();
        // cadence lent to untimed streams that have no frame rate of their own
        let fallback_rate = self
            .mappings
            .iter()
            .map(StreamMapping::input)
            .find(|s| self.primary == Some(s.index()) && s.has_frame_rate())
            .map(|s| s.rate());
        let (Some(source), Some(sink)) = (self.source.as_mut(), self.sink.as_mut()) else {
            return StopReason::EndOfStream;
        };

        loop {
            if cancel.is_cancelled() {
                return StopReason::Cancelled;
            }

            let mut packet = match source.read_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => return StopReason::EndOfStream,
                Err(e) => {
                    return StopReason::ReadError(
                        RelayError::Read {
                            url: self.config.source.clone(),
                            reason: format!("{:#}", e),
                        }
                        .to_string(),
                    );
                }
            };
            self.packets_read += 1;

            let Some(mapping) = self
                .mappings
                .iter_mut()
                .find(|m| m.input().index() == packet.index())
            else {
                log::warn!("dropping packet on unknown stream {}", packet.index());
                self.packets_dropped += 1;
                continue;
            };

            self.synthesizer
                .process(&mut packet, mapping.input(), fallback_rate);
            packet.rescale_ts(mapping.output_time_base());
            packet.reset_position();
            packet.set_stream(mapping.output_index());
            keep_dts_monotonic(&mut packet, mapping);

            let primary = self.primary == Some(mapping.input().index());
            if paced && primary {
                let pace = self.pacer.pace(packet.dts(), packet.time_base(), cancel);
                if pace == Pace::Cancelled {
                    self.packets_dropped += 1;
                    return StopReason::Cancelled;
                }
            }

            if let Err(e) = sink.write_packet(&mut packet) {
                self.packets_dropped += 1;
                return StopReason::MuxError(
                    RelayError::Mux {
                        index: packet.index(),
                        reason: format!("{:#}", e),
                    }
                    .to_string(),
                );
            }
            self.packets_written += 1;
            if primary {
                self.video_frames += 1;
                log::debug!(
                    "{} {:8} video frames to '{}'",
                    verb,
                    self.video_frames,
                    self.config.destination
                );
            }
        }
    }
}

impl<Io: ContainerIo, C: Clock> Drop for Session<Io, C> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open the destination I/O handle when the muxer needs one, write the
/// header and pick up the time bases the muxer settled on. Returns whether
/// an I/O handle was opened.
fn write_header<S: ContainerSink>(
    sink: &mut S,
    config: &RelayConfig,
    mappings: &mut [StreamMapping],
) -> Result<bool> {
    let io_opened = sink.requires_io();
    if io_opened {
        sink.open_io(&config.output_options)
            .map_err(|e| RelayError::open(Endpoint::Output, &config.destination, e))?;
    } else {
        log::debug!("{} muxer does its own I/O", sink.format_name());
    }
    sink.write_header(&config.output_options)
        .map_err(|e| RelayError::HeaderWrite {
            url: config.destination.clone(),
            reason: format!("{:#}", e),
        })?;

    for mapping in mappings.iter_mut() {
        match sink.stream_time_base(mapping.output_index()) {
            Some(tb) if tb.numerator() > 0 && tb.denominator() > 0 => {
                if tb != mapping.output_time_base() {
                    log::debug!(
                        "output stream {} time base {} -> {}",
                        mapping.output_index(),
                        mapping.output_time_base(),
                        tb
                    );
                }
                mapping.set_output_time_base(tb);
            }
            _ => log::warn!(
                "output stream {} has no time base, keeping {}",
                mapping.output_index(),
                mapping.output_time_base()
            ),
        }
    }
    log::info!(
        "{}",
        MediaInfo::from_mappings(&config.destination, sink.format_name(), mappings)
    );
    Ok(io_opened)
}

/// Clamp a regressing DTS to the last one written on the stream and keep
/// PTS >= DTS.
fn keep_dts_monotonic(packet: &mut RawPacket, mapping: &mut StreamMapping) {
    let Some(dts) = packet.dts() else {
        return;
    };
    let fixed = mapping.monotonic_dts(dts);
    if fixed != dts {
        log::warn!(
            "non-monotonic DTS {} on output stream {}, using {}",
            dts,
            mapping.output_index(),
            fixed
        );
    }
    let pts = packet.pts().map(|pts| pts.max(fixed));
    let duration = packet.duration();
    packet.set_timestamps(pts, Some(fixed), duration);
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
