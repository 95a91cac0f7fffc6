use std::ffi::CString;
use std::os::raw::c_int;

use ffmpeg_next::{Dictionary, Rational, codec::Parameters, ffi, format};

use crate::{
    container::{ContainerSink, to_dictionary},
    packet::RawPacket,
};

/// Muxer for the destination. The context is allocated up front so streams
/// can be declared; the I/O handle is opened separately, right before the
/// header, and only for formats that need one.
pub struct AvOutput {
    url: String,
    format_name: String,
    inner: Option<format::context::Output>,
    io_opened: bool,
    have_written_header: bool,
    have_written_trailer: bool,
}

impl AvOutput {
    pub fn new(url: &str, format: Option<&str>) -> anyhow::Result<Self> {
        let c_url = CString::new(url).map_err(|e| anyhow::anyhow!("invalid url {:?}: {}", url, e))?;
        let c_format = format
            .map(CString::new)
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid format name {:?}: {}", format, e))?;

        let mut ptr = std::ptr::null_mut();
        let ret = unsafe {
            ffi::avformat_alloc_output_context2(
                &mut ptr,
                std::ptr::null(),
                c_format.as_ref().map_or(std::ptr::null(), |f| f.as_ptr()),
                c_url.as_ptr(),
            )
        };
        if ret < 0 {
            return Err(anyhow::anyhow!(
                "could not create output context: {}",
                ffmpeg_next::Error::from(ret)
            ));
        }
        if ptr.is_null() {
            return Err(anyhow::anyhow!("could not create output context"));
        }

        let inner = unsafe { format::context::Output::wrap(ptr) };
        let format_name = inner.format().name().to_string();

        Ok(Self {
            url: url.to_string(),
            format_name,
            inner: Some(inner),
            io_opened: false,
            have_written_header: false,
            have_written_trailer: false,
        })
    }

    fn flags(&self) -> format::Flags {
        self.inner
            .as_ref()
            .map(|o| o.format().flags())
            .unwrap_or_else(format::Flags::empty)
    }

    fn context(&mut self) -> anyhow::Result<&mut format::context::Output> {
        self.inner
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("output {} is closed", self.url))
    }
}

impl ContainerSink for AvOutput {
    fn format_name(&self) -> &str {
        &self.format_name
    }

    fn requires_global_header(&self) -> bool {
        self.flags().contains(format::Flags::GLOBAL_HEADER)
    }

    fn requires_io(&self) -> bool {
        !self.flags().contains(format::Flags::NO_FILE)
    }

    fn strict_timestamps(&self) -> bool {
        !self.flags().contains(format::Flags::TS_NONSTRICT)
    }

    fn add_stream(&mut self, parameters: &Parameters) -> anyhow::Result<usize> {
        let output = self.context()?;
        let mut writer_stream = output.add_stream(ffmpeg_next::encoder::find(parameters.id()))?;
        writer_stream.set_parameters(parameters.clone());
        Ok(writer_stream.index())
    }

    fn open_io(&mut self, options: &[(String, String)]) -> anyhow::Result<()> {
        if self.io_opened || !self.requires_io() {
            return Ok(());
        }
        let c_url = CString::new(self.url.as_str())?;
        let output = self.context()?;

        let ret = unsafe {
            let mut opts = to_dictionary(options).disown();
            let ret = ffi::avio_open2(
                &mut (*output.as_mut_ptr()).pb,
                c_url.as_ptr(),
                ffi::AVIO_FLAG_WRITE as c_int,
                std::ptr::null(),
                &mut opts,
            );
            // whatever the protocol did not consume
            Dictionary::own(opts);
            ret
        };
        if ret < 0 {
            return Err(anyhow::anyhow!("{}", ffmpeg_next::Error::from(ret)));
        }
        self.io_opened = true;
        Ok(())
    }

    fn write_header(&mut self, options: &[(String, String)]) -> anyhow::Result<()> {
        if self.have_written_header {
            return Ok(());
        }
        let output = self.context()?;
        let unused = output.write_header_with(to_dictionary(options))?;
        for (key, value) in unused.iter() {
            log::debug!("muxer ignored option {}={}", key, value);
        }
        self.have_written_header = true;
        Ok(())
    }

    fn stream_time_base(&self, index: usize) -> Option<Rational> {
        self.inner
            .as_ref()
            .and_then(|o| o.stream(index))
            .map(|s| s.time_base())
    }

    fn write_packet(&mut self, packet: &mut RawPacket) -> anyhow::Result<()> {
        if !self.have_written_header {
            return Err(anyhow::anyhow!("header not written"));
        }
        let output = self.context()?;
        packet.get_mut().write_interleaved(output)?;
        Ok(())
    }

    fn write_trailer(&mut self) -> anyhow::Result<()> {
        if self.have_written_header && !self.have_written_trailer {
            self.have_written_trailer = true;
            self.context()?.write_trailer()?;
        }
        Ok(())
    }

    fn close(&mut self) {
        let Some(mut output) = self.inner.take() else {
            return;
        };
        log::debug!("closing output {}", self.url);
        if self.io_opened {
            unsafe {
                ffi::avio_closep(&mut (*output.as_mut_ptr()).pb);
            }
            self.io_opened = false;
        }
        // frees the format context
        drop(output);
    }
}

impl Drop for AvOutput {
    fn drop(&mut self) {
        self.close();
    }
}
