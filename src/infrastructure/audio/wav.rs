use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),
    #[error("PCM data is not a whole number of frames ({0} bytes)")]
    PartialFrame(usize),
    #[error("WAV encoding failed: {0}")]
    Encoding(#[from] hound::Error),
}

/// Layout of raw little-endian PCM samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// 24 kHz mono 16-bit, what Gemini speech models emit
    pub const GEMINI_SPEECH: PcmFormat = PcmFormat {
        sample_rate: 24_000,
        channels: 1,
        bits_per_sample: 16,
    };

    /// Read the sample rate from a mime type like `audio/L16;codec=pcm;rate=24000`,
    /// keeping `default`'s other fields
    pub fn from_mime(mime: &str, default: PcmFormat) -> PcmFormat {
        let sample_rate = mime
            .split(';')
            .filter_map(|param| param.trim().strip_prefix("rate="))
            .find_map(|rate| rate.parse::<u32>().ok())
            .unwrap_or(default.sample_rate);

        PcmFormat {
            sample_rate,
            ..default
        }
    }

    fn frame_bytes(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bits_per_sample / 8)
    }
}

/// Frame raw PCM bytes in a RIFF/WAVE container
pub fn wrap_pcm_as_wav(pcm: &[u8], format: PcmFormat) -> Result<Vec<u8>, WavError> {
    if format.bits_per_sample != 16 {
        return Err(WavError::UnsupportedBitDepth(format.bits_per_sample));
    }
    if format.frame_bytes() == 0 || pcm.len() % format.frame_bytes() != 0 {
        return Err(WavError::PartialFrame(pcm.len()));
    }

    let spec = WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Exact playback length of raw PCM
pub fn pcm_duration_ms(pcm_len: usize, format: PcmFormat) -> i32 {
    let bytes_per_second = format.frame_bytes() as u64 * u64::from(format.sample_rate);
    if bytes_per_second == 0 {
        return 0;
    }
    let ms = pcm_len as u64 * 1000 / bytes_per_second;
    i32::try_from(ms).unwrap_or(i32::MAX)
}
