use ffmpeg_next::{Rational, codec::Parameters, format::stream, media};

unsafe impl Send for AvStream {}
unsafe impl Sync for AvStream {}

/// One elementary stream of a container: index, time base, nominal frame
/// rate and the opaque codec parameters.
pub struct AvStream {
    index: usize,
    parameters: Parameters,
    time_base: Rational,
    rate: Rational,
}

impl AvStream {
    pub fn new(index: usize, parameters: Parameters, time_base: Rational, rate: Rational) -> Self {
        Self {
            index,
            parameters,
            time_base,
            rate,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
    pub fn time_base(&self) -> Rational {
        self.time_base
    }
    pub fn rate(&self) -> Rational {
        self.rate
    }

    pub fn medium(&self) -> media::Type {
        self.parameters.medium()
    }

    pub fn is_video(&self) -> bool {
        self.medium() == media::Type::Video
    }

    pub fn is_audio(&self) -> bool {
        self.medium() == media::Type::Audio
    }

    /// True when the nominal frame rate is usable for timestamp synthesis.
    pub fn has_frame_rate(&self) -> bool {
        is_valid_rate(self.rate)
    }

    pub fn codec_tag(&self) -> u32 {
        codec_tag(&self.parameters)
    }

    pub fn width(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr();
            (*ptr).width.max(0) as u32
        }
    }

    pub fn height(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr();
            (*ptr).height.max(0) as u32
        }
    }

    pub fn sample_rate(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr();
            (*ptr).sample_rate.max(0) as u32
        }
    }

    pub fn channels(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr();
            (*ptr).ch_layout.nb_channels.max(0) as u32
        }
    }
}

/// A frame rate with a positive numerator and denominator.
pub fn is_valid_rate(rate: Rational) -> bool {
    rate.numerator() > 0 && rate.denominator() > 0
}

/// Container-specific fourcc of the codec (0 = let the muxer choose).
pub fn codec_tag(parameters: &Parameters) -> u32 {
    unsafe { (*parameters.as_ptr()).codec_tag }
}

/// Drop the source container's fourcc so the destination picks its own.
pub fn clear_codec_tag(parameters: &mut Parameters) {
    unsafe {
        (*parameters.as_mut_ptr()).codec_tag = 0;
    }
}

impl From<stream::Stream<'_>> for AvStream {
    fn from(stream: stream::Stream<'_>) -> Self {
        // r_frame_rate is what raw elementary streams report; fall back to the
        // average when the demuxer could not guess it.
        let mut rate = stream.rate();
        if rate.numerator() <= 0 || rate.denominator() <= 0 {
            rate = stream.avg_frame_rate();
        }
        Self {
            index: stream.index(),
            parameters: stream.parameters(),
            time_base: stream.time_base(),
            rate,
        }
    }
}

impl Clone for AvStream {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            parameters: self.parameters.clone(),
            time_base: self.time_base,
            rate: self.rate,
        }
    }
}

impl std::fmt::Debug for AvStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvStream")
            .field("index", &self.index)
            .field("medium", &self.medium())
            .field("codec", &self.parameters.id())
            .field("time_base", &self.time_base)
            .field("rate", &self.rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_io::parameters;
    use ffmpeg_next::codec::Id;

    #[test]
    fn test_clear_codec_tag() {
        let mut params = parameters(media::Type::Video, Id::H264, 0x3163_7661);
        assert_eq!(codec_tag(&params), 0x3163_7661);
        clear_codec_tag(&mut params);
        assert_eq!(codec_tag(&params), 0);
    }

    #[test]
    fn test_stream_kind_and_rate() {
        let video = AvStream::new(
            0,
            parameters(media::Type::Video, Id::H264, 0),
            Rational(1, 90000),
            Rational(25, 1),
        );
        assert!(video.is_video());
        assert!(!video.is_audio());
        assert!(video.has_frame_rate());

        let audio = AvStream::new(
            1,
            parameters(media::Type::Audio, Id::AAC, 0),
            Rational(1, 44100),
            Rational(0, 1),
        );
        assert!(audio.is_audio());
        assert!(!audio.has_frame_rate());
    }

    #[test]
    fn test_clone_keeps_parameters() {
        let stream = AvStream::new(
            3,
            parameters(media::Type::Audio, Id::MP3, 42),
            Rational(1, 48000),
            Rational(0, 0),
        );
        let copy = stream.clone();
        assert_eq!(copy.index(), 3);
        assert_eq!(copy.parameters().id(), Id::MP3);
        assert_eq!(copy.codec_tag(), 42);
        assert_eq!(copy.time_base(), Rational(1, 48000));
    }
}
