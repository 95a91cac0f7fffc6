//! Synthetic timestamps for sources that carry none (raw elementary streams).
//!
//! The cadence is assumed constant at the stream's nominal frame rate, so the
//! result is wrong for variable-frame-rate input; that is accepted for
//! headerless sources.

use std::collections::{HashMap, HashSet};

use ffmpeg_next::Rational;

use crate::{
    packet::RawPacket,
    rescale::{Rounding, TIME_BASE_Q, rescale_rnd},
    stream::{AvStream, is_valid_rate},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyntheticTimestamp {
    pub pts: i64,
    pub dts: i64,
    pub duration: i64,
}

/// Duration of one frame in microseconds, truncated. None when the rate is unknown.
pub fn frame_duration_us(frame_rate: Rational) -> Option<i64> {
    if !is_valid_rate(frame_rate) {
        return None;
    }
    let period = Rational(frame_rate.denominator(), frame_rate.numerator());
    Some(rescale_rnd(1, period, TIME_BASE_Q, Rounding::Zero))
}

/// Timestamps of frame `n` in `time_base` at a constant `frame_rate`.
pub fn synthesize(n: i64, time_base: Rational, frame_rate: Rational) -> Option<SyntheticTimestamp> {
    let frame_us = frame_duration_us(frame_rate)?;
    let pts = rescale_rnd(
        n.saturating_mul(frame_us),
        TIME_BASE_Q,
        time_base,
        Rounding::Zero,
    );
    let duration = rescale_rnd(frame_us, TIME_BASE_Q, time_base, Rounding::Zero);
    Some(SyntheticTimestamp {
        pts,
        dts: pts,
        duration,
    })
}

/// Per-stream frame counters feeding [`synthesize`].
#[derive(Default)]
pub struct TimestampSynthesizer {
    counters: HashMap<usize, i64>,
    warned: HashSet<usize>,
}

impl TimestampSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packets seen so far on `stream_index`.
    pub fn frame_count(&self, stream_index: usize) -> i64 {
        self.counters.get(&stream_index).copied().unwrap_or(0)
    }

    /// Count `packet` against its stream and, if it has no PTS, fill in
    /// PTS/DTS/duration from the stream cadence. Streams without a frame rate
    /// (audio) borrow `fallback_rate`, the cadence of the primary video
    /// stream. Returns true when synthesized.
    pub fn process(
        &mut self,
        packet: &mut RawPacket,
        stream: &AvStream,
        fallback_rate: Option<Rational>,
    ) -> bool {
        let counter = self.counters.entry(stream.index()).or_insert(0);
        let n = *counter;
        *counter += 1;

        if packet.pts().is_some() {
            return false;
        }

        let rate = if stream.has_frame_rate() {
            stream.rate()
        } else {
            fallback_rate.unwrap_or(stream.rate())
        };
        match synthesize(n, packet.time_base(), rate) {
            Some(ts) => {
                packet.set_timestamps(Some(ts.pts), Some(ts.dts), ts.duration);
                true
            }
            None => {
                if self.warned.insert(stream.index()) {
                    log::warn!(
                        "stream {} has no PTS and no usable frame rate, timestamps left unset",
                        stream.index()
                    );
                }
                false
            }
        }
    }
}
