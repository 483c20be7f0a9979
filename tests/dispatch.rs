use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};

use kokoro_dispatch::{
    AudioFormat, AudioResult, Dispatcher, DispatcherConfig, SynthesisAdapter, SynthesisError,
    WordTimestamp,
};

/// Deterministic adapter: fixed bytes, evenly spaced timestamps, and a log of
/// what reached it.
#[derive(Default)]
struct StubAdapter {
    combined: Vec<Vec<String>>,
    voices_seen: Vec<String>,
}

impl SynthesisAdapter for StubAdapter {
    fn synthesize(
        &mut self,
        _text: &str,
        voice: &str,
        _speed: f32,
        format: AudioFormat,
    ) -> Result<AudioResult, SynthesisError> {
        if voice == "xx_broken" {
            return Err(SynthesisError::new("Voice 'xx_broken' not found"));
        }
        self.voices_seen.push(voice.to_string());
        Ok(AudioResult {
            bytes: b"RIFF".to_vec(),
            format,
        })
    }

    fn combine_voices(&mut self, voices: &[String]) -> Result<Vec<u8>, SynthesisError> {
        self.combined.push(voices.to_vec());
        Ok(vec![0x93, b'N', b'U', b'M', b'P', b'Y'])
    }

    fn synthesize_with_timestamps(
        &mut self,
        text: &str,
        voice: &str,
        speed: f32,
        format: AudioFormat,
    ) -> Result<(AudioResult, Vec<WordTimestamp>), SynthesisError> {
        let audio = self.synthesize(text, voice, speed, format)?;
        let timestamps = text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| WordTimestamp {
                word: word.to_string(),
                start: i as f64 * 0.25,
                end: (i + 1) as f64 * 0.25,
            })
            .collect();
        Ok((audio, timestamps))
    }

    fn text_to_phonemes(&mut self, text: &str, _language: &str) -> Result<String, SynthesisError> {
        Ok(format!("/{}/", text.to_lowercase()))
    }

    fn phonemes_to_audio(
        &mut self,
        _phonemes: &str,
        _voice: &str,
    ) -> Result<AudioResult, SynthesisError> {
        Ok(AudioResult {
            bytes: vec![1, 2, 3, 4, 5],
            format: AudioFormat::Wav,
        })
    }

    fn list_voices(&mut self) -> Result<Vec<String>, SynthesisError> {
        Ok(vec!["af_bella".to_string(), "af_sky".to_string()])
    }
}

fn dispatcher() -> Dispatcher<StubAdapter> {
    Dispatcher::new(StubAdapter::default(), DispatcherConfig::default())
}

fn handle(payload: Value) -> Value {
    serde_json::to_value(dispatcher().handle(&payload)).unwrap()
}

fn assert_failure_citing(envelope: &Value, field: &str) {
    assert_eq!(envelope["success"], json!(false), "{envelope}");
    let error = envelope["error"].as_str().expect("error message");
    assert!(error.contains(&format!("'{field}'")), "{error}");
    let keys: Vec<&String> = envelope.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 2, "failure envelope has extra fields: {keys:?}");
}

#[test]
fn speech_scenario_matches_expected_envelope() {
    let envelope = handle(json!({ "input": "Hi", "voice": "af_bella", "response_format": "wav" }));
    assert_eq!(
        envelope,
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
fn size_bytes_matches_decoded_audio() {
    for payload in [
        json!({ "input": "Hello there" }),
        json!({ "endpoint": "generate-from-phonemes", "phonemes": "həlˈoʊ" }),
        json!({ "endpoint": "captioned-speech", "input": "a b", "return_timestamps": true }),
    ] {
        let envelope = handle(payload);
        let decoded = BASE64
            .decode(envelope["audio_base64"].as_str().unwrap())
            .unwrap();
        assert_eq!(envelope["size_bytes"], json!(decoded.len()));
    }
}

#[test]
fn missing_endpoint_routes_to_standard_speech() {
    let mut dispatcher = dispatcher();
    let envelope = dispatcher.handle(&json!({ "text": "Hi" }));
    assert!(envelope.success);
    assert_eq!(envelope.model.as_deref(), Some("kokoro"));
    assert_eq!(dispatcher.adapter().voices_seen, vec!["af_bella"]);
}

#[test]
fn unknown_endpoints_fail_without_panicking() {
    for endpoint in ["/v1/models", "speech", "", "LIST-VOICES"] {
        let envelope = handle(json!({ "endpoint": endpoint, "input": "Hi" }));
        assert_eq!(envelope["success"], json!(false));
        assert!(envelope["error"].as_str().unwrap().contains("Unknown endpoint"));
    }
}

#[test]
fn out_of_range_speed_cites_speed() {
    for speed in [0.1, 2.5] {
        let envelope = handle(json!({ "input": "Hi", "speed": speed }));
        assert_failure_citing(&envelope, "speed");
    }
}

#[test]
fn voice_combine_reaches_adapter_as_ordered_list() {
    let mut dispatcher = dispatcher();
    let envelope = dispatcher.handle(&json!({
        "endpoint": "voice-combine",
        "voices": "af_bella+af_sky",
    }));
    assert_eq!(
        dispatcher.adapter().combined,
        vec![vec!["af_bella".to_string(), "af_sky".to_string()]]
    );
    let envelope = serde_json::to_value(envelope).unwrap();
    assert_eq!(envelope["voices"], json!(["af_bella", "af_sky"]));
    assert_eq!(envelope["voice"], json!("af_bella+af_sky"));
    assert_eq!(envelope["size_bytes"], json!(6));
    assert!(envelope.get("audio_base64").is_none());
}

#[test]
fn captioned_timestamps_are_ordered() {
    let envelope = handle(json!({
        "endpoint": "captioned-speech",
        "input": "The quick brown fox",
        "return_timestamps": true,
    }));
    let timestamps = envelope["timestamps"].as_array().unwrap();
    assert_eq!(timestamps.len(), 4);
    assert_eq!(timestamps[0]["word"], json!("The"));

    let mut last_start = f64::MIN;
    for entry in timestamps {
        let start = entry["start"].as_f64().unwrap();
        let end = entry["end"].as_f64().unwrap();
        assert!(start >= last_start);
        assert!(end >= start);
        last_start = start;
    }
}

#[test]
fn identical_payloads_give_identical_envelopes() {
    let payload = json!({
        "endpoint": "captioned-speech",
        "input": "Same words twice",
        "voice": "af_sky",
        "speed": 1.25,
        "return_timestamps": true,
    });
    let mut dispatcher = dispatcher();
    let first = dispatcher.handle(&payload);
    let second = dispatcher.handle(&payload);
    assert_eq!(first, second);
}

#[test]
fn list_voices_has_no_audio() {
    let envelope = handle(json!({ "endpoint": "list-voices" }));
    assert_eq!(
        envelope,
        json!({ "success": true, "voices": ["af_bella", "af_sky"] })
    );
}

#[test]
fn unsupported_phonemize_language_cites_language() {
    let envelope = handle(json!({ "endpoint": "phonemize", "text": "Hello", "language": "z" }));
    assert_failure_citing(&envelope, "language");
}

#[test]
fn phonemize_returns_phonemes() {
    let envelope = handle(json!({ "endpoint": "/dev/phonemize", "text": "Hello", "language": "b" }));
    assert_eq!(
        envelope,
        json!({ "success": true, "phonemes": "/hello/", "text": "Hello", "language": "b" })
    );
}

#[test]
fn engine_failures_surface_as_messages() {
    let envelope = handle(json!({ "input": "Hi", "voice": "xx_broken" }));
    assert_eq!(
        envelope,
        json!({ "success": false, "error": "Synthesis failed: Voice 'xx_broken' not found" })
    );
}

#[test]
fn unknown_fields_are_ignored() {
    let envelope = handle(json!({
        "input": "Hi",
        "stream": true,
        "normalization_options": { "normalize": false },
        "method": "GET",
    }));
    assert_eq!(envelope["success"], json!(true));
}
