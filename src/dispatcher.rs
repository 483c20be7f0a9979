use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;

use crate::config::DispatcherConfig;
use crate::error::{DispatchError, Result, SynthesisError};
use crate::normalize::{self, NormalizedRequest};
use crate::payload::JobPayload;
use crate::response::{self, ResponseEnvelope};
use crate::route;
use crate::{SynthesisAdapter, SynthesisOutput};

/// Runs one job at a time against an owned synthesis adapter.
///
/// [`handle`](Dispatcher::handle) always returns an envelope: route,
/// parameter and engine errors, and panics raised while processing, all
/// become `{"success": false, "error": ...}`.
pub struct Dispatcher<A> {
    adapter: A,
    config: DispatcherConfig,
}

impl<A: SynthesisAdapter> Dispatcher<A> {
    pub fn new(adapter: A, config: DispatcherConfig) -> Self {
        Self { adapter, config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Tear down the dispatcher and hand back the adapter.
    pub fn into_adapter(self) -> A {
        self.adapter
    }

    /// Process one job payload and produce its envelope.
    pub fn handle(&mut self, payload: &Value) -> ResponseEnvelope {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(payload)))
            .unwrap_or_else(|panic| Err(DispatchError::InternalFault(panic_message(&*panic))));

        match outcome {
            Ok(envelope) => envelope,
            Err(err) => {
                log::error!("Job failed ({}): {err}", err.kind());
                ResponseEnvelope::from(&err)
            }
        }
    }

    /// Process a raw job document, unwrapping the platform's job wrapper.
    /// Text that is not JSON yields a failure envelope on `payload`.
    pub fn handle_json(&mut self, job: &str) -> ResponseEnvelope {
        match serde_json::from_str::<Value>(job) {
            Ok(job) => self.handle(JobPayload::unwrap_job(&job)),
            Err(err) => {
                let err = DispatchError::invalid("payload", format!("not valid JSON: {err}"));
                log::error!("Job failed ({}): {err}", err.kind());
                ResponseEnvelope::from(&err)
            }
        }
    }

    fn process(&mut self, payload: &Value) -> Result<ResponseEnvelope> {
        let payload = JobPayload::from_value(payload)?;
        let descriptor = route::resolve(&payload)?;
        let request = normalize::normalize(descriptor.route, &payload, &self.config)?;
        log::debug!("Dispatching {} job", descriptor.id);

        let output = self.invoke(&request)?;
        response::build(&request, output)
    }

    fn invoke(&mut self, request: &NormalizedRequest) -> Result<SynthesisOutput, SynthesisError> {
        let adapter = &mut self.adapter;
        let output = match request {
            NormalizedRequest::StandardSpeech(speech) => {
                log::info!(
                    "Synthesizing {} chars with voice '{}' at {}x as {}",
                    speech.text.chars().count(),
                    speech.voice,
                    speech.speed,
                    speech.format
                );
                SynthesisOutput::Audio(adapter.synthesize(
                    &speech.text,
                    &speech.voice,
                    speech.speed,
                    speech.format,
                )?)
            }
            NormalizedRequest::CaptionedSpeech(captioned) => {
                let speech = &captioned.speech;
                log::info!(
                    "Synthesizing {} chars with voice '{}' (timestamps: {})",
                    speech.text.chars().count(),
                    speech.voice,
                    captioned.return_timestamps
                );
                if captioned.return_timestamps {
                    let (audio, timestamps) = adapter.synthesize_with_timestamps(
                        &speech.text,
                        &speech.voice,
                        speech.speed,
                        speech.format,
                    )?;
                    SynthesisOutput::TimestampedAudio { audio, timestamps }
                } else {
                    SynthesisOutput::Audio(adapter.synthesize(
                        &speech.text,
                        &speech.voice,
                        speech.speed,
                        speech.format,
                    )?)
                }
            }
            NormalizedRequest::VoiceCombine(combine) => {
                log::info!("Combining voices {:?}", combine.voices);
                SynthesisOutput::VoiceBlob(adapter.combine_voices(&combine.voices)?)
            }
            NormalizedRequest::Phonemize(req) => {
                log::info!(
                    "Phonemizing {} chars as '{}'",
                    req.text.chars().count(),
                    req.language
                );
                SynthesisOutput::Phonemes(adapter.text_to_phonemes(&req.text, &req.language)?)
            }
            NormalizedRequest::GenerateFromPhonemes(req) => {
                log::info!(
                    "Generating audio from {} phoneme chars with voice '{}'",
                    req.phonemes.chars().count(),
                    req.voice
                );
                SynthesisOutput::Audio(adapter.phonemes_to_audio(&req.phonemes, &req.voice)?)
            }
            NormalizedRequest::ListVoices => SynthesisOutput::Voices(adapter.list_voices()?),
        };
        Ok(output)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "job panicked".to_string()
    }
}
