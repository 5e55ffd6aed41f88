use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Raw decoded audio in interleaved `f32` samples.
pub(super) struct DecodedAudio {
    pub(super) samples: Vec<f32>,
    pub(super) sample_rate: u32,
    pub(super) channels: u16,
}

struct OpenTrack {
    reader: Box<dyn FormatReader>,
    track_id: u32,
    params: CodecParameters,
}

/// Decode every packet of the default track. An empty `samples` vector means the
/// container was valid but held no audio.
pub(super) fn decode_audio(path: &Path) -> Result<DecodedAudio, String> {
    let OpenTrack {
        mut reader,
        track_id,
        params,
    } = open_track(path)?;
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| "container does not declare a sample rate".to_string())?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|err| format!("unsupported codec: {err}"))?;

    let mut channels = params.channels.map_or(0, |set| set.count() as u16);
    let mut samples = Vec::new();
    let mut scratch: Option<SampleBuffer<f32>> = None;
    while let Some(packet) = next_packet(reader.as_mut())? {
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt frames inside an otherwise readable stream are dropped.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => return Err(format!("decoding failed: {err}")),
        };
        let spec: SignalSpec = *decoded.spec();
        channels = spec.channels.count() as u16;
        let frames = decoded.capacity() as u64;
        let required = frames as usize * spec.channels.count();
        if scratch.as_ref().is_none_or(|buffer| buffer.capacity() < required) {
            scratch = Some(SampleBuffer::new(frames, spec));
        }
        let Some(buffer) = scratch.as_mut() else {
            continue;
        };
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    Ok(DecodedAudio {
        samples,
        sample_rate: sample_rate.max(1),
        channels: channels.max(1),
    })
}

fn open_track(path: &Path) -> Result<OpenTrack, String> {
    let file = File::open(path).map_err(|err| format!("cannot open: {err}"))?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|err| format!("unrecognized audio container: {err}"))?;
    let reader = probed.format;
    let track = reader
        .default_track()
        .ok_or_else(|| "container has no audio track".to_string())?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    Ok(OpenTrack {
        reader,
        track_id,
        params,
    })
}

/// Next packet, `None` at end of stream.
fn next_packet(reader: &mut dyn FormatReader) -> Result<Option<Packet>, String> {
    match reader.next_packet() {
        Ok(packet) => Ok(Some(packet)),
        Err(SymphoniaError::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(SymphoniaError::ResetRequired) => Ok(None),
        Err(err) => Err(format!("reading packets failed: {err}")),
    }
}
