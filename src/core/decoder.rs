// src/core/decoder.rs
//
// Audio decoding via Symphonia, down-mixing and resampling to the analysis
// rate. Every failure here is reported as an AudioLoad error for the file.

use log::debug;
use rubato::{FftFixedInOut, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use std::fs::File;
use std::path::Path;

use crate::error::{Result, TamperError};

const RESAMPLE_CHUNK: usize = 1024;

/// Container for decoded audio data and metadata
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of audio channels
    pub channels: usize,
    /// Duration in seconds
    pub duration_secs: f64,
    /// Original codec name
    pub codec_name: String,
}

/// Decode audio file to floating-point samples
pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = File::open(path)
        .map_err(|e| TamperError::audio_load(path, format!("cannot open file: {}", e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(ext.to_str().unwrap_or(""));
    }

    let mut probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| TamperError::audio_load(path, format!("unsupported or corrupt: {}", e)))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| TamperError::audio_load(path, "no supported audio track"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| TamperError::audio_load(path, "sample rate not specified"))?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);
    if channels == 0 {
        return Err(TamperError::audio_load(path, "file reports 0 audio channels"));
    }
    let codec_name = format!("{:?}", track.codec_params.codec);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| TamperError::audio_load(path, format!("no decoder: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match probed.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(TamperError::audio_load(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(buf) => buf,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(TamperError::audio_load(path, e)),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(TamperError::audio_load(path, "no audio samples decoded"));
    }

    let duration_secs = samples.len() as f64 / (sample_rate as f64 * channels as f64);
    debug!(
        "decoded {}: {} Hz, {} ch, {:.2}s ({})",
        path.display(),
        sample_rate,
        channels,
        duration_secs,
        codec_name
    );

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
        duration_secs,
        codec_name,
    })
}

/// Extract mono samples from potentially multi-channel audio
pub fn extract_mono(audio: &AudioData) -> Vec<f32> {
    if audio.channels == 1 {
        return audio.samples.clone();
    }

    audio
        .samples
        .chunks_exact(audio.channels)
        .map(|frame| frame.iter().sum::<f32>() / audio.channels as f32)
        .collect()
}

/// Resample mono audio with an FFT-based synchronous resampler.
///
/// Output length is `round(len * to / from)`; the resampler's group delay is
/// trimmed from the front.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(TamperError::Config(format!(
            "cannot resample {} Hz -> {} Hz",
            from_rate, to_rate
        )));
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 1)
            .map_err(|e| TamperError::Config(format!("resampler init failed: {}", e)))?;

    let expected_len =
        (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let delay = resampler.output_delay();
    let chunk_size = resampler.input_frames_next();

    let mut output = Vec::with_capacity(expected_len + delay + chunk_size);
    let mut pos = 0;
    while output.len() < expected_len + delay {
        let mut block = vec![0.0f32; chunk_size];
        if pos < samples.len() {
            let end = (pos + chunk_size).min(samples.len());
            block[..end - pos].copy_from_slice(&samples[pos..end]);
        }
        pos += chunk_size;

        let result = resampler
            .process(&[block], None)
            .map_err(|e| TamperError::Config(format!("resampling failed: {}", e)))?;
        output.extend_from_slice(&result[0]);
    }

    debug!(
        "resampled {} samples {} Hz -> {} samples {} Hz",
        samples.len(),
        from_rate,
        expected_len,
        to_rate
    );
    Ok(output[delay..delay + expected_len].to_vec())
}

/// Decode a file, down-mix to mono and resample to `target_rate`
pub fn load_mono(path: &Path, target_rate: u32) -> Result<Vec<f32>> {
    let audio = decode_audio(path)?;
    let mono = extract_mono(&audio);
    let samples = resample(&mono, audio.sample_rate, target_rate)
        .map_err(|e| TamperError::audio_load(path, e))?;
    if samples.is_empty() {
        return Err(TamperError::audio_load(path, "audio is empty after resampling"));
    }
    Ok(samples)
}
