//! Sample decoding and WAV export
//!
//! Samples are decoded with Symphonia (WAV, FLAC, Ogg Vorbis) into
//! interleaved `f32` and then packed into a [`Sample`]. Offline renders are
//! written back out with hound as 32-bit float WAV.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::{AudioError, AudioResult};
use crate::engine::{Sample, SampleMap};
use crate::types::CHANNELS;

/// File extensions picked up by [`load_sample_dir`]
pub const SAMPLE_EXTENSIONS: [&str; 4] = ["wav", "flac", "ogg", "oga"];

/// Interleaved PCM straight out of the decoder
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl DecodedAudio {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }
}

fn decode_error(path: &Path, reason: impl ToString) -> AudioError {
    AudioError::Decode {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Decode a whole file to interleaved `f32`
pub fn decode_file(path: &Path) -> AudioResult<DecodedAudio> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_error(path, e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_error(path, "no audio track found"))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| decode_error(path, "unknown sample rate"))?;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(path, e))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                log::warn!("{}: error reading packet: {}", path.display(), e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("{}: skipping corrupt packet: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(decode_error(path, e)),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels.get_or_insert(spec.channels.count());
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    let channels = channels.ok_or_else(|| decode_error(path, "unknown channel layout"))?;
    log::debug!(
        "Decoded {}: {} frames, {} channels @ {}Hz",
        path.display(),
        samples.len() / channels.max(1),
        channels,
        sample_rate
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Decode a file into a [`Sample`] named after the file stem
///
/// The normalization peak is computed from the decoded data.
pub fn load_sample(path: &Path, id: u32) -> AudioResult<Sample> {
    let decoded = decode_file(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sample")
        .to_string();
    Sample::from_f32(id, name, &decoded.samples, decoded.channels, decoded.sample_rate, None)
}

/// Numeric sample ID encoded in a file stem, e.g. `05.wav` or `kick_12.ogg`
fn id_from_stem(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

/// Load every supported file of a directory into a sample table
///
/// IDs are taken from trailing digits of the file stem. Files without one
/// get the next free ID after the largest one seen. Files that fail to
/// decode are skipped with a warning.
pub fn load_sample_dir(dir: &Path) -> AudioResult<SampleMap> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SAMPLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();

    let mut samples = SampleMap::new();
    let mut unnumbered = Vec::new();
    for path in paths {
        match id_from_stem(&path) {
            Some(id) if !samples.contains_key(&id) => match load_sample(&path, id) {
                Ok(sample) => {
                    samples.insert(id, sample);
                }
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            },
            _ => unnumbered.push(path),
        }
    }

    let mut next_id = samples.keys().max().map_or(1, |max| max + 1);
    for path in unnumbered {
        match load_sample(&path, next_id) {
            Ok(sample) => {
                samples.insert(next_id, sample);
                next_id += 1;
            }
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    log::info!("Loaded {} samples from {}", samples.len(), dir.display());
    Ok(samples)
}

/// Write interleaved stereo `f32` to a 32-bit float WAV file
pub fn write_wav(path: &Path, sample_rate: u32, interleaved: &[f32]) -> AudioResult<()> {
    use hound::{SampleFormat, WavSpec, WavWriter};

    let spec = WavSpec {
        channels: CHANNELS as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let wav = |e: hound::Error| AudioError::Wav(e.to_string());
    let mut writer = WavWriter::create(path, spec).map_err(wav)?;
    for &sample in interleaved {
        writer.write_sample(sample).map_err(wav)?;
    }
    writer.finalize().map_err(wav)?;

    log::info!(
        "Wrote {} ({:.2}s)",
        path.display(),
        interleaved.len() as f64 / (CHANNELS as f64 * f64::from(sample_rate))
    );
    Ok(())
}
