//! Per-route parameter normalization.
//!
//! Each route has one profile that turns a raw [`JobPayload`] into a typed
//! request. Every field of a normalized request already satisfies the
//! route's constraints, so adapters never re-validate.
//!
//! Text to synthesize is read from `input` (the OpenAI-compatible name) with
//! `text` as an alias. `phonemize` reads `text` first and accepts `input` as
//! the alias.

use serde_json::Value;

use crate::config::DispatcherConfig;
use crate::error::{DispatchError, Result};
use crate::payload::{json_type, JobPayload};
use crate::route::Route;
use crate::AudioFormat;

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;
pub const DEFAULT_SPEED: f32 = 1.0;
pub const DEFAULT_FORMAT: AudioFormat = AudioFormat::Mp3;

/// Separator for voice blends and `voice-combine` lists.
pub const VOICE_SEPARATOR: char = '+';

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    /// Voice id or `+`-joined blend, passed through verbatim
    pub voice: String,
    pub speed: f32,
    pub format: AudioFormat,
    /// Informational model name, echoed back
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionedSpeechRequest {
    pub speech: SpeechRequest,
    pub return_timestamps: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceCombineRequest {
    /// At least two non-empty ids, in the caller's order
    pub voices: Vec<String>,
}

impl VoiceCombineRequest {
    /// The blend name the combined voice is known by, e.g. `af_bella+af_sky`.
    pub fn blend_name(&self) -> String {
        self.voices.join(&VOICE_SEPARATOR.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonemizeRequest {
    pub text: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonemeAudioRequest {
    pub phonemes: String,
    pub voice: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRequest {
    StandardSpeech(SpeechRequest),
    VoiceCombine(VoiceCombineRequest),
    CaptionedSpeech(CaptionedSpeechRequest),
    Phonemize(PhonemizeRequest),
    GenerateFromPhonemes(PhonemeAudioRequest),
    ListVoices,
}

impl NormalizedRequest {
    pub fn route(&self) -> Route {
        match self {
            NormalizedRequest::StandardSpeech(_) => Route::StandardSpeech,
            NormalizedRequest::VoiceCombine(_) => Route::VoiceCombine,
            NormalizedRequest::CaptionedSpeech(_) => Route::CaptionedSpeech,
            NormalizedRequest::Phonemize(_) => Route::Phonemize,
            NormalizedRequest::GenerateFromPhonemes(_) => Route::GenerateFromPhonemes,
            NormalizedRequest::ListVoices => Route::ListVoices,
        }
    }
}

/// Apply the profile for `route` to `payload`.
pub fn normalize(
    route: Route,
    payload: &JobPayload<'_>,
    config: &DispatcherConfig,
) -> Result<NormalizedRequest> {
    let request = match route {
        Route::StandardSpeech => NormalizedRequest::StandardSpeech(speech(payload, config)?),
        Route::VoiceCombine => NormalizedRequest::VoiceCombine(voice_combine(payload)?),
        Route::CaptionedSpeech => NormalizedRequest::CaptionedSpeech(CaptionedSpeechRequest {
            speech: speech(payload, config)?,
            return_timestamps: payload.bool_field("return_timestamps")?.unwrap_or(false),
        }),
        Route::Phonemize => NormalizedRequest::Phonemize(phonemize(payload, config)?),
        Route::GenerateFromPhonemes => {
            NormalizedRequest::GenerateFromPhonemes(PhonemeAudioRequest {
                phonemes: required_text(payload, "phonemes", None)?,
                voice: voice(payload, config)?,
            })
        }
        Route::ListVoices => NormalizedRequest::ListVoices,
    };
    Ok(request)
}

fn speech(payload: &JobPayload<'_>, config: &DispatcherConfig) -> Result<SpeechRequest> {
    let requested = match payload.str_field("response_format")? {
        Some(name) => Some(name),
        None => payload.str_field("format")?,
    };
    let format = match requested {
        None => DEFAULT_FORMAT,
        Some(name) => AudioFormat::parse(name).ok_or_else(|| {
            DispatchError::invalid(
                "response_format",
                format!("'{name}' is not one of mp3, wav, pcm"),
            )
        })?,
    };

    Ok(SpeechRequest {
        text: required_text(payload, "input", Some("text"))?,
        voice: voice(payload, config)?,
        speed: speed(payload)?,
        format,
        model: payload
            .str_field("model")?
            .map(str::to_string)
            .unwrap_or_else(|| config.model_name.clone()),
    })
}

fn phonemize(payload: &JobPayload<'_>, config: &DispatcherConfig) -> Result<PhonemizeRequest> {
    let text = required_text(payload, "text", Some("input"))?;
    let language = match payload.str_field("language")? {
        None => config.default_language.clone(),
        Some(code) if config.supports_language(code.trim()) => code.trim().to_string(),
        Some(code) => {
            return Err(DispatchError::invalid(
                "language",
                format!(
                    "'{code}' is not a supported language code (expected one of {})",
                    config.supported_languages.join(", ")
                ),
            ))
        }
    };
    Ok(PhonemizeRequest { text, language })
}

fn voice_combine(payload: &JobPayload<'_>) -> Result<VoiceCombineRequest> {
    let voices: Vec<String> = match payload.get("voices") {
        None => return Err(DispatchError::invalid("voices", "is required")),
        Some(Value::String(joined)) => joined
            .split(VOICE_SEPARATOR)
            .map(|id| id.trim().to_string())
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(|id| id.trim().to_string()).ok_or_else(|| {
                    DispatchError::invalid(
                        "voices",
                        format!("list entries must be strings, got {}", json_type(item)),
                    )
                })
            })
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(DispatchError::invalid(
                "voices",
                format!("expected a '+'-joined string or a list, got {}", json_type(other)),
            ))
        }
    };

    if voices.iter().any(String::is_empty) {
        return Err(DispatchError::invalid(
            "voices",
            "voice identifiers must not be empty",
        ));
    }
    if voices.len() < 2 {
        return Err(DispatchError::invalid(
            "voices",
            format!("at least two voices are needed to combine, got {}", voices.len()),
        ));
    }

    Ok(VoiceCombineRequest { voices })
}

fn voice(payload: &JobPayload<'_>, config: &DispatcherConfig) -> Result<String> {
    match payload.str_field("voice")? {
        None => Ok(config.default_voice.clone()),
        Some(voice) if voice.trim().is_empty() => {
            Err(DispatchError::invalid("voice", "must not be empty"))
        }
        Some(voice) => Ok(voice.to_string()),
    }
}

fn speed(payload: &JobPayload<'_>) -> Result<f32> {
    let Some(speed) = payload.number_field("speed")? else {
        return Ok(DEFAULT_SPEED);
    };
    if !speed.is_finite() || speed < f64::from(MIN_SPEED) || speed > f64::from(MAX_SPEED) {
        return Err(DispatchError::invalid(
            "speed",
            format!("must be between {MIN_SPEED:.1} and {MAX_SPEED:.1}, got {speed}"),
        ));
    }
    Ok(speed as f32)
}

/// Read a required non-blank string from `field`, falling back to `alias`
/// when `field` is missing or blank. Errors name `field`.
fn required_text(
    payload: &JobPayload<'_>,
    field: &'static str,
    alias: Option<&'static str>,
) -> Result<String> {
    let value = payload.str_field(field)?;
    if let Some(text) = value.filter(|text| !text.trim().is_empty()) {
        return Ok(text.to_string());
    }
    let fallback = match alias {
        Some(alias) => payload.str_field(alias)?,
        None => None,
    };

    match fallback.or(value) {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        Some(_) => Err(DispatchError::invalid(field, "must not be empty")),
        None => Err(DispatchError::invalid(
            field,
            match alias {
                Some(alias) => format!("is required (or '{alias}')"),
                None => "is required".to_string(),
            },
        )),
    }
}
