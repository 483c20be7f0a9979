//! # kokoro-dispatch
//!
//! A single-job dispatcher for Kokoro text-to-speech workers. Each invocation
//! takes one JSON job payload, routes it to one of six synthesis operations,
//! and returns one uniform JSON envelope with binary artifacts base64-encoded.
//!
//! ## Routes
//!
//! | `endpoint` | Operation |
//! |---|---|
//! | `standard-speech` (default) | Text to audio |
//! | `voice-combine` | Blend voices into a style file |
//! | `captioned-speech` | Text to audio with word timestamps |
//! | `phonemize` | Text to phonemes |
//! | `generate-from-phonemes` | Phonemes to audio |
//! | `list-voices` | Available voice identifiers |
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! kokoro-dispatch = { version = "2026.2", features = ["kokoro"] }
//! ```
//!
//! ```ignore
//! use std::path::PathBuf;
//! use kokoro_dispatch::{engines::kokoro::KokoroEngine, Dispatcher, DispatcherConfig};
//!
//! let mut engine = KokoroEngine::new();
//! engine.load_model(&PathBuf::from("models/kokoro"), Default::default())?;
//!
//! let mut dispatcher = Dispatcher::new(engine, DispatcherConfig::default());
//! let envelope = dispatcher.handle(&serde_json::json!({ "input": "Hello, world!" }));
//! println!("{}", serde_json::to_string(&envelope)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audio;
pub mod config;
pub mod dispatcher;
pub mod engines;
pub mod error;
pub mod normalize;
pub mod payload;
pub mod response;
pub mod route;

use std::fmt;

use serde::Serialize;

pub use config::{DispatcherConfig, DispatcherConfigBuilder};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, SynthesisError};
pub use response::ResponseEnvelope;

/// Audio container format requested by (and reported back to) the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    /// Raw 16-bit little-endian mono samples, no header.
    Pcm,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 3] = [AudioFormat::Mp3, AudioFormat::Wav, AudioFormat::Pcm];

    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
        }
    }

    /// Parse a format name, ignoring ASCII case.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded audio produced by a synthesis adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioResult {
    /// Encoded audio bytes
    pub bytes: Vec<u8>,
    /// Format of `bytes`. May differ from the requested one when the engine
    /// had to fall back (e.g. no MP3 encoder available).
    pub format: AudioFormat,
}

/// A word and its position in the synthesized audio, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordTimestamp {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// Everything a route can produce. Built once per job and consumed by the
/// response builder.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutput {
    Audio(AudioResult),
    TimestampedAudio {
        audio: AudioResult,
        timestamps: Vec<WordTimestamp>,
    },
    Phonemes(String),
    /// Serialized style of a combined voice.
    VoiceBlob(Vec<u8>),
    Voices(Vec<String>),
}

/// Boundary to a speech-synthesis engine.
///
/// Implementations receive already-validated parameters: the dispatcher
/// guarantees non-empty text, a speed in `[0.5, 2.0]` and a supported
/// language code. Voice identifiers are passed through verbatim and may be a
/// `+`-joined blend; interpreting them is the engine's job.
pub trait SynthesisAdapter {
    /// Synthesize speech from text.
    fn synthesize(
        &mut self,
        text: &str,
        voice: &str,
        speed: f32,
        format: AudioFormat,
    ) -> Result<AudioResult, SynthesisError>;

    /// Blend two or more voices and return the serialized style.
    fn combine_voices(&mut self, voices: &[String]) -> Result<Vec<u8>, SynthesisError>;

    /// Synthesize speech and report where each word lands in the audio.
    ///
    /// Timestamps must be in word order with non-decreasing starts and
    /// `end >= start`.
    fn synthesize_with_timestamps(
        &mut self,
        text: &str,
        voice: &str,
        speed: f32,
        format: AudioFormat,
    ) -> Result<(AudioResult, Vec<WordTimestamp>), SynthesisError>;

    /// Convert text to a phoneme string for the given language code.
    fn text_to_phonemes(&mut self, text: &str, language: &str) -> Result<String, SynthesisError>;

    /// Synthesize speech from an already-phonemic string.
    fn phonemes_to_audio(&mut self, phonemes: &str, voice: &str)
        -> Result<AudioResult, SynthesisError>;

    /// List the voice identifiers this engine can speak with.
    fn list_voices(&mut self) -> Result<Vec<String>, SynthesisError>;
}
