//! Audio normalization for transcription.
//!
//! Three ordered attempts, each reported through [`AudioSource`]:
//! decode whatever container the probe recognizes, decode again with the
//! Matroska/WebM reader forced (the browser recorder format), or hand the
//! original bytes through unchanged.
//!
//! symphonia 0.5 ships no Opus decoder, so WebM/Opus browser recordings
//! open as WebM but fail at the codec and end up `Unchanged`. The hosted
//! transcriber accepts them as-is.

use std::io::{Cursor, ErrorKind};

use anyhow::{bail, Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::formats::MkvReader;
use tracing::{debug, info, warn};

use salesvox_contracts::pipeline::{AudioSource, TRANSCRIBE_CHANNELS, TRANSCRIBE_SAMPLE_RATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Wav,
    WebM,
    Ogg,
    Mp3,
    Flac,
    Mp4,
    Unknown,
}

impl Container {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            Container::Wav
        } else if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            Container::WebM
        } else if bytes.starts_with(b"OggS") {
            Container::Ogg
        } else if bytes.starts_with(b"fLaC") {
            Container::Flac
        } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            Container::Mp4
        } else if bytes.starts_with(b"ID3")
            || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
        {
            Container::Mp3
        } else {
            Container::Unknown
        }
    }

    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Container::Wav => Some("wav"),
            Container::WebM => Some("webm"),
            Container::Ogg => Some("ogg"),
            Container::Mp3 => Some("mp3"),
            Container::Flac => Some("flac"),
            Container::Mp4 => Some("m4a"),
            Container::Unknown => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Container::Wav => "audio/wav",
            Container::WebM => "audio/webm",
            Container::Ogg => "audio/ogg",
            Container::Mp3 => "audio/mpeg",
            Container::Flac => "audio/flac",
            Container::Mp4 => "audio/mp4",
            Container::Unknown => "application/octet-stream",
        }
    }
}

/// Container assumed on the second decode attempt.
pub const FALLBACK_CONTAINER: Container = Container::WebM;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAudio {
    pub bytes: Vec<u8>,
    pub source: AudioSource,
    /// Container of `bytes` as handed to the transcriber.
    pub container: Container,
}

impl NormalizedAudio {
    pub fn file_name(&self) -> String {
        format!("audio.{}", self.container.extension().unwrap_or("webm"))
    }

    pub fn mime(&self) -> &'static str {
        self.container.mime()
    }
}

struct DecodedAudio {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
}

type DecodeAttempt = fn(&[u8]) -> Result<DecodedAudio>;

pub fn normalize(raw: &[u8]) -> NormalizedAudio {
    normalize_with(
        raw,
        [
            ("probed", decode_probed as DecodeAttempt, AudioSource::Decoded),
            ("webm", decode_webm as DecodeAttempt, AudioSource::DecodedViaFallback),
        ],
    )
}

fn normalize_with(raw: &[u8], attempts: [(&str, DecodeAttempt, AudioSource); 2]) -> NormalizedAudio {
    let sniffed = Container::sniff(raw);

    for (label, attempt, source) in attempts {
        match attempt(raw).and_then(|decoded| to_transcription_wav(&decoded)) {
            Ok(bytes) => {
                info!(
                    "Normalized {:?} audio via {label} decode ({} -> {} bytes)",
                    sniffed,
                    raw.len(),
                    bytes.len()
                );
                return NormalizedAudio {
                    bytes,
                    source,
                    container: Container::Wav,
                };
            }
            Err(err) => debug!("{label} decode failed: {err:#}"),
        }
    }

    warn!("Audio could not be decoded; passing original bytes through");
    NormalizedAudio {
        bytes: raw.to_vec(),
        source: AudioSource::Unchanged,
        container: if sniffed == Container::Unknown {
            FALLBACK_CONTAINER
        } else {
            sniffed
        },
    }
}

fn source_stream(raw: &[u8]) -> MediaSourceStream {
    MediaSourceStream::new(Box::new(Cursor::new(raw.to_vec())), Default::default())
}

/// Lets the probe pick the reader from the stream's own markers.
fn decode_probed(raw: &[u8]) -> Result<DecodedAudio> {
    let mut hint = Hint::new();
    if let Some(extension) = Container::sniff(raw).extension() {
        hint.with_extension(extension);
    }
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source_stream(raw),
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("unrecognized audio container")?;
    decode_track(probed.format)
}

/// Skips the probe and reads the stream as Matroska/WebM.
fn decode_webm(raw: &[u8]) -> Result<DecodedAudio> {
    let reader = MkvReader::try_new(source_stream(raw), &FormatOptions::default())
        .context("not a WebM stream")?;
    decode_track(Box::new(reader))
}

fn decode_track(mut format: Box<dyn FormatReader>) -> Result<DecodedAudio> {
    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .context("no decodable audio track")?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .context("unsupported audio codec")?;

    let mut samples = Vec::new();
    let mut channels = params.channels.map(|layout| layout.count()).unwrap_or(0);
    let mut sample_rate = params.sample_rate.unwrap_or(0);
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(err).context("failed reading audio packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels = spec.channels.count();
                sample_rate = spec.rate;
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(reason)) => {
                debug!("skipping undecodable packet: {reason}");
            }
            Err(err) => return Err(err).context("audio decode failed"),
        }
    }

    if samples.is_empty() || channels == 0 || sample_rate == 0 {
        bail!("no audio frames decoded");
    }
    Ok(DecodedAudio {
        samples,
        channels,
        sample_rate,
    })
}

fn to_transcription_wav(decoded: &DecodedAudio) -> Result<Vec<u8>> {
    let mono = downmix(&decoded.samples, decoded.channels);
    let resampled = resample_linear(&mono, decoded.sample_rate, TRANSCRIBE_SAMPLE_RATE);
    encode_wav(&resampled, TRANSCRIBE_SAMPLE_RATE)
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let step = from_rate as f64 / to_rate as f64;
    let out_len = (input.len() as f64 / step).floor() as usize;
    (0..out_len)
        .map(|index| {
            let position = index as f64 * step;
            let base = position.floor() as usize;
            let frac = (position - base as f64) as f32;
            let current = input[base];
            let next = input.get(base + 1).copied().unwrap_or(current);
            current + (next - current) * frac
        })
        .collect()
}

fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: TRANSCRIBE_CHANNELS,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
            .context("failed to start WAV encoder")?;
        for sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize().context("failed to finish WAV encoding")?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use salesvox_contracts::pipeline::AudioSource;

    use anyhow::bail;

    use super::{
        decode_probed, decode_webm, downmix, normalize, normalize_with, resample_linear,
        Container, DecodeAttempt, DecodedAudio,
    };
    use crate::fakes::tone_wav;

    fn refuse(_raw: &[u8]) -> anyhow::Result<DecodedAudio> {
        bail!("container not recognized")
    }

    fn silence_48k(_raw: &[u8]) -> anyhow::Result<DecodedAudio> {
        Ok(DecodedAudio {
            samples: vec![0.0; 4_800],
            channels: 1,
            sample_rate: 48_000,
        })
    }

    #[test]
    fn sniffs_common_containers() {
        assert_eq!(Container::sniff(b"RIFF\0\0\0\0WAVEfmt "), Container::Wav);
        assert_eq!(Container::sniff(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]), Container::WebM);
        assert_eq!(Container::sniff(b"OggS\0\x02"), Container::Ogg);
        assert_eq!(Container::sniff(b"ID3\x04\0"), Container::Mp3);
        assert_eq!(Container::sniff(b"\0\0\0\x20ftypM4A "), Container::Mp4);
        assert_eq!(Container::sniff(b"hello"), Container::Unknown);
    }

    #[test]
    fn stereo_wav_becomes_16k_mono() -> anyhow::Result<()> {
        let input = tone_wav(44_100, 2, 0.5)?;
        let normalized = normalize(&input);
        assert_eq!(normalized.source, AudioSource::Decoded);
        assert_eq!(normalized.container, Container::Wav);
        assert_eq!(normalized.file_name(), "audio.wav");

        let reader = hound::WavReader::new(Cursor::new(normalized.bytes))?;
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        let frames = reader.duration() as i64;
        assert!((frames - 8_000).abs() <= 2, "frames = {frames}");
        Ok(())
    }

    #[test]
    fn webm_retry_is_a_distinct_reader() -> anyhow::Result<()> {
        let wav = tone_wav(16_000, 1, 0.1)?;
        assert!(decode_probed(&wav).is_ok());
        assert!(decode_webm(&wav).is_err());
        Ok(())
    }

    #[test]
    fn second_attempt_is_tagged_as_fallback() -> anyhow::Result<()> {
        let raw = b"\x1A\x45\xDF\xA3 opus frames".to_vec();
        let normalized = normalize_with(
            &raw,
            [
                ("probed", refuse as DecodeAttempt, AudioSource::Decoded),
                ("webm", silence_48k as DecodeAttempt, AudioSource::DecodedViaFallback),
            ],
        );
        assert_eq!(normalized.source, AudioSource::DecodedViaFallback);
        assert_eq!(normalized.container, Container::Wav);

        let reader = hound::WavReader::new(Cursor::new(normalized.bytes))?;
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.duration(), 1_600);
        Ok(())
    }

    #[test]
    fn first_successful_attempt_wins() {
        let normalized = normalize_with(
            b"anything",
            [
                ("probed", silence_48k as DecodeAttempt, AudioSource::Decoded),
                ("webm", refuse as DecodeAttempt, AudioSource::DecodedViaFallback),
            ],
        );
        assert_eq!(normalized.source, AudioSource::Decoded);
    }

    #[test]
    fn undecodable_bytes_pass_through_unchanged() {
        let garbage = b"definitely not audio data at all".to_vec();
        let normalized = normalize(&garbage);
        assert_eq!(normalized.source, AudioSource::Unchanged);
        assert_eq!(normalized.bytes, garbage);
        assert_eq!(normalized.container, Container::WebM);
        assert_eq!(normalized.mime(), "audio/webm");
    }

    #[test]
    fn truncated_wav_keeps_its_sniffed_container() {
        let truncated = b"RIFF\x24\0\0\0WAVEfmt ".to_vec();
        let normalized = normalize(&truncated);
        assert_eq!(normalized.source, AudioSource::Unchanged);
        assert_eq!(normalized.container, Container::Wav);
    }

    #[test]
    fn downmix_and_resample_shapes() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        let ramp: Vec<f32> = (0..48).map(|i| i as f32).collect();
        let out = resample_linear(&ramp, 48_000, 16_000);
        assert_eq!(out.len(), 16);
        assert_eq!(out[1], 3.0);
    }
}
