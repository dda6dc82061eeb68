pub mod wav;

pub use wav::{pcm_duration_ms, wrap_pcm_as_wav, PcmFormat, WavError};
