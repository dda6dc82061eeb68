use crate::domain::episode::Segment;
use sha2::{Digest, Sha256};

/// Marker returned when there is no content to hash. Never matches a cache entry.
pub const EMPTY_SOURCE_HASH: &str = "empty";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAsset {
    pub filename: String,
    pub updated_at: String,
}

/// Everything upstream generation reads from a lesson
#[derive(Debug, Clone, Default)]
pub struct SourceHashInputs {
    pub notes_final_text: Option<String>,
    pub notes_raw_text: Option<String>,
    pub transcript_text: Option<String>,
    pub youtube_transcript: Option<String>,
    pub assets: Vec<SourceAsset>,
}

/// Deterministic content hashes.
///
/// `hash_inputs` is exported for the upstream script generator, which keys
/// its text-generation cache on it; nothing in the voicing pass reads lesson
/// sources. `hash_script` fingerprints an episode's finalized script so a
/// voicing pass can tell whether segment text moved underneath it.
pub struct SourceHasher;

impl SourceHasher {
    pub fn hash_inputs(inputs: &SourceHashInputs) -> String {
        let mut parts: Vec<String> = Vec::new();

        // Final notes win over raw notes
        if let Some(notes) = non_empty(&inputs.notes_final_text) {
            parts.push(format!("notes:{}", notes));
        } else if let Some(notes) = non_empty(&inputs.notes_raw_text) {
            parts.push(format!("notes:{}", notes));
        }

        if let Some(transcript) = non_empty(&inputs.transcript_text) {
            parts.push(format!("transcript:{}", transcript));
        }

        if let Some(youtube) = non_empty(&inputs.youtube_transcript) {
            parts.push(format!("youtube:{}", youtube));
        }

        if !inputs.assets.is_empty() {
            let mut assets = inputs.assets.clone();
            assets.sort_by(|a, b| a.filename.cmp(&b.filename));
            let listed: Vec<String> = assets
                .iter()
                .map(|asset| format!("{}:{}", asset.filename, asset.updated_at))
                .collect();
            parts.push(format!("assets:{}", listed.join(",")));
        }

        if parts.is_empty() {
            return EMPTY_SOURCE_HASH.to_string();
        }

        sha256_hex(parts.join("|").as_bytes())
    }

    /// Fingerprint of (seq, speaker, text) in playback order
    pub fn hash_script(segments: &[Segment]) -> String {
        if segments.is_empty() {
            return EMPTY_SOURCE_HASH.to_string();
        }

        let mut ordered: Vec<&Segment> = segments.iter().collect();
        ordered.sort_by_key(|segment| segment.seq);

        let mut hasher = Sha256::new();
        for segment in ordered {
            // Unit/record separators keep field boundaries unambiguous
            hasher.update(segment.seq.to_string().as_bytes());
            hasher.update([0x1f]);
            hasher.update(segment.speaker.as_bytes());
            hasher.update([0x1f]);
            hasher.update(segment.text.as_bytes());
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn is_cacheable(hash: &str) -> bool {
        !hash.is_empty() && hash != EMPTY_SOURCE_HASH
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.is_empty())
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
