//! In-memory container I/O and a manual clock for exercising the pipeline
//! without real files or sockets.

use std::cell::{Cell, Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ffmpeg_next::{Rational, codec::Id, codec::Parameters, media};
use tokio_util::sync::CancellationToken;

use crate::{
    container::{ContainerIo, ContainerSink, ContainerSource},
    pacer::Clock,
    packet::RawPacket,
    rescale::rescale,
    stream::AvStream,
};

pub const AVC1: u32 = u32::from_le_bytes(*b"avc1");
pub const MP4A: u32 = u32::from_le_bytes(*b"mp4a");

pub fn parameters(medium: media::Type, id: Id, tag: u32) -> Parameters {
    let mut parameters = Parameters::new();
    unsafe {
        let ptr = parameters.as_mut_ptr();
        (*ptr).codec_type = medium.into();
        (*ptr).codec_id = id.into();
        (*ptr).codec_tag = tag;
    }
    parameters
}

pub fn video_stream(index: usize, time_base: Rational, rate: Rational) -> AvStream {
    AvStream::new(
        index,
        parameters(media::Type::Video, Id::H264, AVC1),
        time_base,
        rate,
    )
}

pub fn audio_stream(index: usize, time_base: Rational) -> AvStream {
    AvStream::new(
        index,
        parameters(media::Type::Audio, Id::AAC, MP4A),
        time_base,
        Rational(0, 1),
    )
}

pub fn packet(
    index: usize,
    time_base: Rational,
    pts: Option<i64>,
    dts: Option<i64>,
    duration: i64,
) -> RawPacket {
    let mut packet = RawPacket::from_data(index, &[index as u8; 8], time_base);
    packet.set_timestamps(pts, dts, duration);
    packet.get_mut().set_position(1024);
    packet
}

/// `per_stream` packets for every stream, round-robin, 40ms apart. With
/// `timed == false` every packet has unset PTS/DTS.
pub fn interleaved_packets(streams: &[AvStream], per_stream: usize, timed: bool) -> Vec<RawPacket> {
    let mut packets = Vec::with_capacity(streams.len() * per_stream);
    for i in 0..per_stream {
        for stream in streams {
            let tb = stream.time_base();
            let duration = rescale(40, Rational(1, 1000), tb);
            let ts = timed.then_some(i as i64 * duration);
            packets.push(packet(stream.index(), tb, ts, ts, duration));
        }
    }
    packets
}

#[derive(Clone, Debug)]
pub struct WrittenPacket {
    pub stream: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub position: isize,
    pub time_base: Rational,
}

#[derive(Default)]
pub struct IoLog {
    pub events: Vec<&'static str>,
    pub source_closes: usize,
    pub sink_closes: usize,
    pub io_opened: bool,
    pub header_written: bool,
    pub trailer_written: bool,
    pub write_attempts: usize,
    pub output_parameters: Vec<Parameters>,
    pub written: Vec<WrittenPacket>,
}

impl IoLog {
    pub fn written_on(&self, stream: usize) -> Vec<&WrittenPacket> {
        self.written.iter().filter(|p| p.stream == stream).collect()
    }
}

/// Builder-style description of a synthetic source and a recording sink.
pub struct MemoryIo {
    streams: Vec<AvStream>,
    packets: Vec<RawPacket>,
    output_time_base: Rational,
    global_header: bool,
    requires_io: bool,
    strict_timestamps: bool,
    fail_source_open: bool,
    fail_io_open: bool,
    fail_header: bool,
    fail_add_stream: Option<usize>,
    fail_write_at: Option<usize>,
    fail_read_at: Option<usize>,
    log: Rc<RefCell<IoLog>>,
}

impl MemoryIo {
    pub fn new(streams: Vec<AvStream>, packets: Vec<RawPacket>) -> Self {
        Self {
            streams,
            packets,
            output_time_base: Rational(1, 1000),
            global_header: false,
            requires_io: true,
            strict_timestamps: false,
            fail_source_open: false,
            fail_io_open: false,
            fail_header: false,
            fail_add_stream: None,
            fail_write_at: None,
            fail_read_at: None,
            log: Rc::new(RefCell::new(IoLog::default())),
        }
    }

    pub fn with_output_time_base(mut self, time_base: Rational) -> Self {
        self.output_time_base = time_base;
        self
    }

    pub fn with_global_header(mut self) -> Self {
        self.global_header = true;
        self
    }

    /// Behave like mp4/mpegts: repeated DTS are rejected.
    pub fn with_strict_timestamps(mut self) -> Self {
        self.strict_timestamps = true;
        self
    }

    pub fn without_io(mut self) -> Self {
        self.requires_io = false;
        self
    }

    pub fn with_failed_source_open(mut self) -> Self {
        self.fail_source_open = true;
        self
    }

    pub fn with_failed_io_open(mut self) -> Self {
        self.fail_io_open = true;
        self
    }

    pub fn with_failed_header(mut self) -> Self {
        self.fail_header = true;
        self
    }

    pub fn with_failed_add_stream(mut self, stream: usize) -> Self {
        self.fail_add_stream = Some(stream);
        self
    }

    /// The `n`-th write (1-based) fails.
    pub fn with_failed_write(mut self, n: usize) -> Self {
        self.fail_write_at = Some(n);
        self
    }

    /// The `n`-th read (1-based) fails.
    pub fn with_failed_read(mut self, n: usize) -> Self {
        self.fail_read_at = Some(n);
        self
    }

    pub fn log(&self) -> Ref<'_, IoLog> {
        self.log.borrow()
    }
}

pub struct MemorySource {
    streams: Vec<AvStream>,
    packets: VecDeque<RawPacket>,
    reads: usize,
    fail_read_at: Option<usize>,
    closed: bool,
    log: Rc<RefCell<IoLog>>,
}

impl ContainerSource for MemorySource {
    fn format_name(&self) -> &str {
        "memory"
    }

    fn streams(&self) -> &[AvStream] {
        &self.streams
    }

    fn read_packet(&mut self) -> anyhow::Result<Option<RawPacket>> {
        self.reads += 1;
        if self.fail_read_at == Some(self.reads) {
            return Err(anyhow::anyhow!("forced read error"));
        }
        Ok(self.packets.pop_front())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut log = self.log.borrow_mut();
            log.source_closes += 1;
            log.events.push("close_source");
        }
    }
}

pub struct MemorySink {
    output_time_base: Rational,
    global_header: bool,
    requires_io: bool,
    strict_timestamps: bool,
    fail_io_open: bool,
    fail_header: bool,
    fail_add_stream: Option<usize>,
    fail_write_at: Option<usize>,
    streams: usize,
    closed: bool,
    log: Rc<RefCell<IoLog>>,
}

impl ContainerSink for MemorySink {
    fn format_name(&self) -> &str {
        "memory"
    }

    fn requires_global_header(&self) -> bool {
        self.global_header
    }

    fn requires_io(&self) -> bool {
        self.requires_io
    }

    fn strict_timestamps(&self) -> bool {
        self.strict_timestamps
    }

    fn add_stream(&mut self, parameters: &Parameters) -> anyhow::Result<usize> {
        if self.fail_add_stream == Some(self.streams) {
            return Err(anyhow::anyhow!("failed allocating output stream"));
        }
        let index = self.streams;
        self.streams += 1;
        let mut log = self.log.borrow_mut();
        log.output_parameters.push(parameters.clone());
        log.events.push("add_stream");
        Ok(index)
    }

    fn open_io(&mut self, _options: &[(String, String)]) -> anyhow::Result<()> {
        if self.fail_io_open {
            return Err(anyhow::anyhow!("connection refused"));
        }
        let mut log = self.log.borrow_mut();
        log.io_opened = true;
        log.events.push("open_io");
        Ok(())
    }

    fn write_header(&mut self, _options: &[(String, String)]) -> anyhow::Result<()> {
        if self.fail_header {
            return Err(anyhow::anyhow!("codec not currently supported in container"));
        }
        let mut log = self.log.borrow_mut();
        log.header_written = true;
        log.events.push("write_header");
        Ok(())
    }

    fn stream_time_base(&self, index: usize) -> Option<Rational> {
        (index < self.streams).then_some(self.output_time_base)
    }

    fn write_packet(&mut self, packet: &mut RawPacket) -> anyhow::Result<()> {
        let mut log = self.log.borrow_mut();
        if !log.header_written {
            return Err(anyhow::anyhow!("header not written"));
        }
        log.write_attempts += 1;
        if self.fail_write_at == Some(log.write_attempts) {
            return Err(anyhow::anyhow!("forced mux error"));
        }
        log.written.push(WrittenPacket {
            stream: packet.index(),
            pts: packet.pts(),
            dts: packet.dts(),
            duration: packet.duration(),
            position: packet.position(),
            time_base: packet.time_base(),
        });
        Ok(())
    }

    fn write_trailer(&mut self) -> anyhow::Result<()> {
        let mut log = self.log.borrow_mut();
        log.trailer_written = true;
        log.events.push("write_trailer");
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut log = self.log.borrow_mut();
            log.sink_closes += 1;
            log.events.push("close_sink");
        }
    }
}

impl ContainerIo for MemoryIo {
    type Source = MemorySource;
    type Sink = MemorySink;

    fn open_source(
        &self,
        _url: &str,
        _format: Option<&str>,
        _options: &[(String, String)],
    ) -> anyhow::Result<MemorySource> {
        if self.fail_source_open {
            return Err(anyhow::anyhow!("No such file or directory"));
        }
        self.log.borrow_mut().events.push("open_source");
        Ok(MemorySource {
            streams: self.streams.clone(),
            packets: self.packets.iter().cloned().collect(),
            reads: 0,
            fail_read_at: self.fail_read_at,
            closed: false,
            log: self.log.clone(),
        })
    }

    fn create_sink(&self, _url: &str, _format: Option<&str>) -> anyhow::Result<MemorySink> {
        self.log.borrow_mut().events.push("create_sink");
        Ok(MemorySink {
            output_time_base: self.output_time_base,
            global_header: self.global_header,
            requires_io: self.requires_io,
            strict_timestamps: self.strict_timestamps,
            fail_io_open: self.fail_io_open,
            fail_header: self.fail_header,
            fail_add_stream: self.fail_add_stream,
            fail_write_at: self.fail_write_at,
            streams: 0,
            closed: false,
            log: self.log.clone(),
        })
    }
}

/// Clock that only moves when slept on or advanced.
pub struct ManualClock {
    base: Instant,
    offset: Cell<Duration>,
    sleeps: RefCell<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Cell::new(Duration::ZERO),
            sleeps: RefCell::new(Vec::new()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }

    fn sleep(&self, duration: Duration, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }
        self.sleeps.borrow_mut().push(duration);
        self.advance(duration);
    }
}

/// Clock whose first sleep fires the cancellation token, as an operator
/// pressing Ctrl-C while a packet is held back.
pub struct CancellingClock {
    inner: ManualClock,
}

impl CancellingClock {
    pub fn new() -> Self {
        Self {
            inner: ManualClock::new(),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.sleeps()
    }
}

impl Clock for CancellingClock {
    fn now(&self) -> Instant {
        self.inner.now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancellationToken) {
        self.inner.sleep(duration, cancel);
        cancel.cancel();
    }
}
