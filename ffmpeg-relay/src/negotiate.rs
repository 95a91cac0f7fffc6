//! Mapping of input streams onto destination streams.

use ffmpeg_next::{Rational, codec, codec::Parameters};

use crate::{
    container::ContainerSink,
    error::{RelayError, Result},
    stream::{AvStream, clear_codec_tag},
};

/// Pairing of one input stream with the output stream created for it.
pub struct StreamMapping {
    input: AvStream,
    output_index: usize,
    output_parameters: Parameters,
    output_time_base: Rational,
    /// The muxer needs strictly increasing DTS.
    strict: bool,
    last_dts: Option<i64>,
}

impl StreamMapping {
    pub fn input(&self) -> &AvStream {
        &self.input
    }

    pub fn output_index(&self) -> usize {
        self.output_index
    }

    pub fn output_parameters(&self) -> &Parameters {
        &self.output_parameters
    }

    pub fn output_time_base(&self) -> Rational {
        self.output_time_base
    }

    pub fn set_output_time_base(&mut self, time_base: Rational) {
        self.output_time_base = time_base;
    }

    pub fn last_dts(&self) -> Option<i64> {
        self.last_dts
    }

    /// Returns the DTS to emit. A DTS moving backwards is replaced by the
    /// previous one, or by the previous one plus one tick when the muxer
    /// rejects repeated DTS (mp4, mpegts).
    pub fn monotonic_dts(&mut self, dts: i64) -> i64 {
        let dts = match self.last_dts {
            Some(last) if self.strict && dts <= last => last.saturating_add(1),
            Some(last) if dts < last => last,
            _ => dts,
        };
        self.last_dts = Some(dts);
        dts
    }
}

/// Capability query: does the destination muxer need codec setup data in its header?
pub fn requires_global_header<S: ContainerSink + ?Sized>(sink: &S) -> bool {
    sink.requires_global_header()
}

/// Codec parameters for the output stream of `input`.
pub fn output_parameters(input: &AvStream, global_header: bool) -> Parameters {
    let mut parameters = if global_header {
        with_global_header(input).unwrap_or_else(|| input.parameters().clone())
    } else {
        input.parameters().clone()
    };
    // after the codec-context round trip, which would copy the source tag back
    clear_codec_tag(&mut parameters);
    parameters
}

/// The global-header flag only exists on a codec context, so run the input
/// parameters through a throwaway decoder context with the flag set.
fn with_global_header(input: &AvStream) -> Option<Parameters> {
    let id = input.parameters().id();
    let Some(decoder) = ffmpeg_next::decoder::find(id) else {
        log::warn!(
            "no decoder for {:?} on stream {}, global header not forced",
            id,
            input.index()
        );
        return None;
    };

    let mut context = codec::Context::new_with_codec(decoder);
    if let Err(e) = context.set_parameters(input.parameters().clone()) {
        log::warn!(
            "stream {}: cannot build codec context for global header: {}",
            input.index(),
            e
        );
        return None;
    }
    context.set_flags(codec::Flags::GLOBAL_HEADER);
    Some(Parameters::from(context.decoder()))
}

/// Create one output stream per input stream, in index order.
pub fn negotiate<S: ContainerSink + ?Sized>(
    inputs: &[AvStream],
    sink: &mut S,
) -> Result<Vec<StreamMapping>> {
    let global_header = requires_global_header(sink);
    if global_header {
        log::debug!("{} muxer requires a global header", sink.format_name());
    }
    let strict = sink.strict_timestamps();

    let mut mappings = Vec::with_capacity(inputs.len());
    for input in inputs {
        let parameters = output_parameters(input, global_header);
        let output_index = sink
            .add_stream(&parameters)
            .map_err(|e| RelayError::Negotiation {
                index: input.index(),
                reason: format!("{:#}", e),
            })?;
        if output_index != input.index() {
            log::warn!(
                "input stream {} mapped to output stream {}",
                input.index(),
                output_index
            );
        }
        mappings.push(StreamMapping {
            input: input.clone(),
            output_index,
            output_parameters: parameters,
            output_time_base: input.time_base(),
            strict,
            last_dts: None,
        });
    }
    Ok(mappings)
}
