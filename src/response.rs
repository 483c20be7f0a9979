use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;

use crate::error::{DispatchError, Result};
use crate::normalize::NormalizedRequest;
use crate::{AudioFormat, AudioResult, SynthesisOutput, WordTimestamp};

/// The single JSON object returned per job.
///
/// On success only the fields relevant to the route are present; on failure
/// only `success` and `error` are.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_file_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<AudioFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Length of the raw binary payload, not of its base64 text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phonemes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<WordTimestamp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voices: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    fn success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    fn with_audio(mut self, audio: &AudioResult) -> Self {
        self.audio_base64 = Some(BASE64.encode(&audio.bytes));
        self.size_bytes = Some(audio.bytes.len());
        self.format = Some(audio.format);
        self
    }
}

impl From<&DispatchError> for ResponseEnvelope {
    fn from(err: &DispatchError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Build the success envelope for `request` from the adapter's output.
///
/// Fails with [`DispatchError::InternalFault`] when the output variant does
/// not belong to the request's route.
pub fn build(request: &NormalizedRequest, output: SynthesisOutput) -> Result<ResponseEnvelope> {
    let envelope = match (request, output) {
        (NormalizedRequest::StandardSpeech(speech), SynthesisOutput::Audio(audio)) => {
            ResponseEnvelope {
                text: Some(speech.text.clone()),
                voice: Some(speech.voice.clone()),
                speed: Some(speech.speed),
                model: Some(speech.model.clone()),
                ..ResponseEnvelope::success()
            }
            .with_audio(&audio)
        }
        (NormalizedRequest::CaptionedSpeech(captioned), output) => {
            let speech = &captioned.speech;
            let (audio, timestamps) = match output {
                SynthesisOutput::Audio(audio) if !captioned.return_timestamps => (audio, None),
                SynthesisOutput::TimestampedAudio { audio, timestamps }
                    if captioned.return_timestamps =>
                {
                    (audio, Some(timestamps))
                }
                other => return Err(mismatch(request, &other)),
            };
            ResponseEnvelope {
                text: Some(speech.text.clone()),
                voice: Some(speech.voice.clone()),
                speed: Some(speech.speed),
                model: Some(speech.model.clone()),
                timestamps,
                ..ResponseEnvelope::success()
            }
            .with_audio(&audio)
        }
        (NormalizedRequest::GenerateFromPhonemes(req), SynthesisOutput::Audio(audio)) => {
            ResponseEnvelope {
                phonemes: Some(req.phonemes.clone()),
                voice: Some(req.voice.clone()),
                ..ResponseEnvelope::success()
            }
            .with_audio(&audio)
        }
        (NormalizedRequest::Phonemize(req), SynthesisOutput::Phonemes(phonemes)) => {
            ResponseEnvelope {
                phonemes: Some(phonemes),
                text: Some(req.text.clone()),
                language: Some(req.language.clone()),
                ..ResponseEnvelope::success()
            }
        }
        (NormalizedRequest::VoiceCombine(req), SynthesisOutput::VoiceBlob(blob)) => {
            ResponseEnvelope {
                voice_file_base64: Some(BASE64.encode(&blob)),
                size_bytes: Some(blob.len()),
                voice: Some(req.blend_name()),
                voices: Some(req.voices.clone()),
                ..ResponseEnvelope::success()
            }
        }
        (NormalizedRequest::ListVoices, SynthesisOutput::Voices(voices)) => ResponseEnvelope {
            voices: Some(voices),
            ..ResponseEnvelope::success()
        },
        (_, other) => return Err(mismatch(request, &other)),
    };
    Ok(envelope)
}

fn mismatch(request: &NormalizedRequest, output: &SynthesisOutput) -> DispatchError {
    let kind = match output {
        SynthesisOutput::Audio(_) => "audio",
        SynthesisOutput::TimestampedAudio { .. } => "timestamped audio",
        SynthesisOutput::Phonemes(_) => "phonemes",
        SynthesisOutput::VoiceBlob(_) => "voice blob",
        SynthesisOutput::Voices(_) => "voice list",
    };
    DispatchError::InternalFault(format!(
        "{} produced an unexpected {kind} result",
        request.route()
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::normalize::{
        CaptionedSpeechRequest, PhonemizeRequest, SpeechRequest, VoiceCombineRequest,
    };

    fn speech_request() -> SpeechRequest {
        SpeechRequest {
            text: "Hi".to_string(),
            voice: "af_bella".to_string(),
            speed: 1.0,
            format: AudioFormat::Wav,
            model: "kokoro".to_string(),
        }
    }

    fn riff() -> AudioResult {
        AudioResult {
            bytes: b"RIFF".to_vec(),
            format: AudioFormat::Wav,
        }
    }

    #[test]
    fn speech_envelope_encodes_audio_and_raw_size() {
        let request = NormalizedRequest::StandardSpeech(speech_request());
        let envelope = build(&request, SynthesisOutput::Audio(riff())).unwrap();
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "success": true,
                "audio_base64": "UklGRg==",
                "text": "Hi",
                "voice": "af_bella",
                "speed": 1.0,
                "format": "wav",
                "model": "kokoro",
                "size_bytes": 4,
            })
        );
    }

    #[test]
    fn failure_envelope_has_only_error() {
        let envelope = ResponseEnvelope::failure("boom");
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({ "success": false, "error": "boom" })
        );
    }

    #[test]
    fn captioned_envelope_keeps_timestamp_order_in_seconds() {
        let request = NormalizedRequest::CaptionedSpeech(CaptionedSpeechRequest {
            speech: speech_request(),
            return_timestamps: true,
        });
        let timestamps = vec![
            WordTimestamp { word: "Hello".into(), start: 0.0, end: 0.35 },
            WordTimestamp { word: "there".into(), start: 0.35, end: 0.8 },
        ];
        let output = SynthesisOutput::TimestampedAudio {
            audio: riff(),
            timestamps,
        };
        let value = serde_json::to_value(build(&request, output).unwrap()).unwrap();
        assert_eq!(
            value["timestamps"],
            json!([
                { "word": "Hello", "start": 0.0, "end": 0.35 },
                { "word": "there", "start": 0.35, "end": 0.8 },
            ])
        );
        assert_eq!(value["model"], json!("kokoro"));
    }

    #[test]
    fn captioned_envelope_rejects_missing_timestamps() {
        let request = NormalizedRequest::CaptionedSpeech(CaptionedSpeechRequest {
            speech: speech_request(),
            return_timestamps: true,
        });
        let err = build(&request, SynthesisOutput::Audio(riff())).unwrap_err();
        assert!(matches!(err, DispatchError::InternalFault(_)));
    }

    #[test]
    fn voice_combine_envelope_reports_blob_size() {
        let request = NormalizedRequest::VoiceCombine(VoiceCombineRequest {
            voices: vec!["af_bella".into(), "af_sky".into()],
        });
        let envelope = build(&request, SynthesisOutput::VoiceBlob(vec![1, 2, 3])).unwrap();
        assert_eq!(envelope.voice_file_base64.as_deref(), Some("AQID"));
        assert_eq!(envelope.size_bytes, Some(3));
        assert_eq!(envelope.voice.as_deref(), Some("af_bella+af_sky"));
        assert!(envelope.audio_base64.is_none());
    }

    #[test]
    fn phonemize_envelope_carries_phonemes_only() {
        let request = NormalizedRequest::Phonemize(PhonemizeRequest {
            text: "Hello".into(),
            language: "a".into(),
        });
        let envelope = build(&request, SynthesisOutput::Phonemes("həlˈoʊ".into())).unwrap();
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({ "success": true, "phonemes": "həlˈoʊ", "text": "Hello", "language": "a" })
        );
    }

    #[test]
    fn mismatched_output_is_an_internal_fault() {
        let err = build(
            &NormalizedRequest::ListVoices,
            SynthesisOutput::Audio(riff()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Internal error: list-voices produced an unexpected audio result"
        );
    }
}
