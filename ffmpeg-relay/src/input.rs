use std::ffi::CString;
use std::path::Path;

use ffmpeg_next::Dictionary;

use crate::{container::ContainerSource, packet::RawPacket, stream::AvStream};

pub struct AvInput {
    url: String,
    format_name: String,
    inner: Option<ffmpeg_next::format::context::Input>,
    streams: Vec<AvStream>,
}

impl AvInput {
    /// Resolve input format by name (e.g. "x11grab", "v4l2", "h264") via FFmpeg's av_find_input_format.
    fn find_input_format(name: &str) -> anyhow::Result<ffmpeg_next::format::format::Input> {
        let cname = CString::new(name)
            .map_err(|e| anyhow::anyhow!("invalid format name {:?}: {}", name, e))?;
        let ptr = unsafe { ffmpeg_next::ffi::av_find_input_format(cname.as_ptr()) };
        if ptr.is_null() {
            return Err(anyhow::anyhow!("input format not found: {}", name));
        }
        Ok(unsafe { ffmpeg_next::format::format::Input::wrap(ptr as *mut _) })
    }

    /// Open `url` and probe its streams (avformat_open_input + avformat_find_stream_info).
    pub fn new(
        url: &str,
        format: Option<&str>,
        options: Option<Dictionary>,
    ) -> anyhow::Result<Self> {
        use ffmpeg_next::format::format::Format;

        let path = Path::new(url);
        let input = match (format, options) {
            (Some(fmt_name), opts) => {
                let fmt = Self::find_input_format(fmt_name)?;
                let ctx = ffmpeg_next::format::open_with(
                    path,
                    &Format::Input(fmt),
                    opts.unwrap_or_else(Dictionary::new),
                )?;
                ctx.input()
            }
            (None, Some(opts)) => ffmpeg_next::format::input_with_dictionary(path, opts)?,
            (None, None) => ffmpeg_next::format::input(path)?,
        };

        let streams = input.streams().map(AvStream::from).collect();
        let format_name = input.format().name().to_string();

        Ok(Self {
            url: url.to_string(),
            format_name,
            inner: Some(input),
            streams,
        })
    }
}

impl ContainerSource for AvInput {
    fn format_name(&self) -> &str {
        &self.format_name
    }

    fn streams(&self) -> &[AvStream] {
        &self.streams
    }

    fn read_packet(&mut self) -> anyhow::Result<Option<RawPacket>> {
        let input = self
            .inner
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("input {} is closed", self.url))?;

        let mut packet = ffmpeg_next::Packet::empty();
        match packet.read(input) {
            Ok(()) => {
                let index = packet.stream();
                // streams discovered after probing still carry a time base
                let time_base = match self.streams.get(index) {
                    Some(stream) => stream.time_base(),
                    None => input
                        .stream(index)
                        .map(|s| s.time_base())
                        .ok_or_else(|| anyhow::anyhow!("packet for unknown stream {}", index))?,
                };
                Ok(Some((packet, time_base).into()))
            }
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        if let Some(input) = self.inner.take() {
            log::debug!("closing input {}", self.url);
            drop(input);
        }
    }
}

impl Drop for AvInput {
    fn drop(&mut self) {
        self.close();
    }
}
