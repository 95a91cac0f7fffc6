use ffmpeg_next::Rational;

use crate::rescale::{TIMESTAMP_ROUNDING, rescale, rescale_rnd};

/// A compressed access unit together with the time base its timestamps are
/// currently expressed in.
#[derive(Clone)]
pub struct RawPacket {
    packet: ffmpeg_next::codec::packet::Packet,
    time_base: Rational,
}

impl RawPacket {
    /// Packet carrying a copy of `data` on `stream_index`, no timing.
    pub fn from_data(stream_index: usize, data: &[u8], time_base: Rational) -> Self {
        let mut packet = ffmpeg_next::codec::packet::Packet::copy(data);
        packet.set_stream(stream_index);
        Self { packet, time_base }
    }

    pub fn pts(&self) -> Option<i64> {
        self.packet.pts()
    }

    pub fn dts(&self) -> Option<i64> {
        self.packet.dts()
    }

    pub fn duration(&self) -> i64 {
        self.packet.duration()
    }

    pub fn position(&self) -> isize {
        self.packet.position()
    }

    pub fn size(&self) -> usize {
        self.packet.size()
    }

    pub fn index(&self) -> usize {
        self.packet.stream()
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn set_timestamps(&mut self, pts: Option<i64>, dts: Option<i64>, duration: i64) {
        self.packet.set_pts(pts);
        self.packet.set_dts(dts);
        self.packet.set_duration(duration);
    }

    pub fn set_stream(&mut self, index: usize) {
        self.packet.set_stream(index);
    }

    /// Byte offsets of the source are meaningless in the destination.
    pub fn reset_position(&mut self) {
        self.packet.set_position(-1);
    }

    /// Reinterpret PTS/DTS/duration in `time_base`. Unset timestamps stay unset.
    pub fn rescale_ts(&mut self, time_base: Rational) {
        let from = self.time_base;
        if from == time_base {
            return;
        }
        let pts = self
            .packet
            .pts()
            .map(|v| rescale_rnd(v, from, time_base, TIMESTAMP_ROUNDING));
        let dts = self
            .packet
            .dts()
            .map(|v| rescale_rnd(v, from, time_base, TIMESTAMP_ROUNDING));
        let duration = rescale(self.packet.duration(), from, time_base);
        self.set_timestamps(pts, dts, duration);
        self.time_base = time_base;
    }

    pub fn get_mut(&mut self) -> &mut ffmpeg_next::codec::packet::Packet {
        &mut self.packet
    }
}

impl From<(ffmpeg_next::codec::packet::Packet, Rational)> for RawPacket {
    fn from((packet, time_base): (ffmpeg_next::codec::packet::Packet, Rational)) -> Self {
        Self { packet, time_base }
    }
}

impl std::fmt::Debug for RawPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawPacket")
            .field("stream", &self.index())
            .field("pts", &self.pts())
            .field("dts", &self.dts())
            .field("duration", &self.duration())
            .field("size", &self.size())
            .field("time_base", &self.time_base)
            .finish()
    }
}
