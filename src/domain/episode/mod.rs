pub mod model;

pub use model::{
    AudioLocation, Episode, EpisodeStatus, JobHandle, NewSegment, Segment, TtsBackend, TtsStatus,
    UnknownBackend,
};
