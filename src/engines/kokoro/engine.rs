use std::path::{Path, PathBuf};

use crate::audio::{duration_secs, encode_samples};
use crate::{AudioFormat, AudioResult, SynthesisAdapter, SynthesisError, WordTimestamp};

use super::model::{KokoroError, KokoroModel, SAMPLE_RATE};
use super::phonemizer::{language_to_espeak, phonemize_ipa, EspeakConfig};

/// Parameters for configuring Kokoro model loading.
#[derive(Debug, Clone, Default)]
pub struct KokoroModelParams {
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    /// Where to cache the Level3-optimized ONNX graph. Must be writable.
    pub optimized_model_cache_path: Option<PathBuf>,
}

/// Kokoro text-to-speech engine, usable as a [`SynthesisAdapter`].
///
/// The engine is a capability object: build it once at startup, load the
/// model, hand it to a [`Dispatcher`](crate::Dispatcher), and drop it at exit.
///
/// ```rust,no_run
/// use kokoro_dispatch::engines::kokoro::{KokoroEngine, KokoroModelParams};
/// use std::path::PathBuf;
///
/// let mut engine = KokoroEngine::new();
/// engine.load_model(&PathBuf::from("models/kokoro"), KokoroModelParams::default())?;
/// println!("{:?}", engine.voices());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct KokoroEngine {
    model: Option<KokoroModel>,
    model_path: Option<PathBuf>,
    espeak: EspeakConfig,
}

impl Default for KokoroEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KokoroEngine {
    /// Create a new engine that uses `espeak-ng` from PATH.
    pub fn new() -> Self {
        Self::with_espeak(EspeakConfig::default())
    }

    /// Create a new engine with a bundled espeak-ng.
    pub fn with_espeak(espeak: EspeakConfig) -> Self {
        Self {
            model: None,
            model_path: None,
            espeak,
        }
    }

    pub fn load_model(
        &mut self,
        model_path: &Path,
        params: KokoroModelParams,
    ) -> Result<(), KokoroError> {
        let model = KokoroModel::load(
            model_path,
            params.num_threads,
            params.optimized_model_cache_path.as_deref(),
        )?;
        self.model = Some(model);
        self.model_path = Some(model_path.to_path_buf());
        Ok(())
    }

    pub fn unload_model(&mut self) {
        if let Some(path) = self.model_path.take() {
            log::info!("Unloading Kokoro model from {}", path.display());
        }
        self.model = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Available voice names (empty until a model is loaded).
    pub fn voices(&self) -> Vec<&str> {
        self.model
            .as_ref()
            .map(KokoroModel::list_voices)
            .unwrap_or_default()
    }

    fn model(&mut self) -> Result<&mut KokoroModel, KokoroError> {
        self.model.as_mut().ok_or(KokoroError::ModelNotLoaded)
    }

    fn synthesize_samples(
        &mut self,
        text: &str,
        voice: &str,
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        let model = self.model.as_mut().ok_or(KokoroError::ModelNotLoaded)?;
        model.synthesize_text(text, voice, speed, &self.espeak)
    }

    fn word_timestamps(
        &self,
        text: &str,
        voice: &str,
        total_secs: f64,
    ) -> Result<Vec<WordTimestamp>, KokoroError> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let model = self.model.as_ref().ok_or(KokoroError::ModelNotLoaded)?;
        let counts = model.word_token_counts(&words, voice, &self.espeak)?;
        Ok(spread_over_words(&words, &counts, total_secs))
    }
}

impl Drop for KokoroEngine {
    fn drop(&mut self) {
        self.unload_model();
    }
}

impl From<KokoroError> for SynthesisError {
    fn from(err: KokoroError) -> Self {
        SynthesisError::new(err.to_string())
    }
}

impl SynthesisAdapter for KokoroEngine {
    fn synthesize(
        &mut self,
        text: &str,
        voice: &str,
        speed: f32,
        format: AudioFormat,
    ) -> Result<AudioResult, SynthesisError> {
        let samples = self.synthesize_samples(text, voice, speed)?;
        Ok(encode_samples(&samples, SAMPLE_RATE, format).map_err(KokoroError::from)?)
    }

    fn combine_voices(&mut self, voices: &[String]) -> Result<Vec<u8>, SynthesisError> {
        Ok(self.model()?.combine_voices(voices)?.to_npy())
    }

    fn synthesize_with_timestamps(
        &mut self,
        text: &str,
        voice: &str,
        speed: f32,
        format: AudioFormat,
    ) -> Result<(AudioResult, Vec<WordTimestamp>), SynthesisError> {
        let samples = self.synthesize_samples(text, voice, speed)?;
        let total_secs = duration_secs(samples.len(), SAMPLE_RATE);
        let timestamps = self.word_timestamps(text, voice, total_secs)?;
        let audio = encode_samples(&samples, SAMPLE_RATE, format).map_err(KokoroError::from)?;
        Ok((audio, timestamps))
    }

    fn text_to_phonemes(&mut self, text: &str, language: &str) -> Result<String, SynthesisError> {
        let lang = language_to_espeak(language)
            .ok_or_else(|| KokoroError::UnsupportedLanguage(language.to_string()))?;
        Ok(phonemize_ipa(text, lang, &self.espeak)?)
    }

    fn phonemes_to_audio(
        &mut self,
        phonemes: &str,
        voice: &str,
    ) -> Result<AudioResult, SynthesisError> {
        let samples = self.model()?.synthesize_phonemes(phonemes, voice, 1.0)?;
        Ok(encode_samples(&samples, SAMPLE_RATE, AudioFormat::Wav).map_err(KokoroError::from)?)
    }

    fn list_voices(&mut self) -> Result<Vec<String>, SynthesisError> {
        let model = self.model()?;
        Ok(model.list_voices().into_iter().map(str::to_string).collect())
    }
}

/// Divide `total_secs` across words in proportion to their phoneme token
/// counts. Words with no tokens get a zero-length slot at the current offset.
/// Offsets are rounded to milliseconds.
fn spread_over_words(words: &[&str], counts: &[usize], total_secs: f64) -> Vec<WordTimestamp> {
    let counts: Vec<usize> = if counts.len() == words.len() && counts.iter().any(|&c| c > 0) {
        counts.to_vec()
    } else {
        vec![1; words.len()]
    };
    let total_tokens: usize = counts.iter().sum();
    let at = |tokens: usize| {
        let secs = total_secs * tokens as f64 / total_tokens.max(1) as f64;
        (secs * 1000.0).round() / 1000.0
    };

    let mut elapsed = 0;
    words
        .iter()
        .zip(counts)
        .map(|(word, count)| {
            let start = at(elapsed);
            elapsed += count;
            WordTimestamp {
                word: (*word).to_string(),
                start,
                end: at(elapsed),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{spread_over_words, KokoroEngine};
    use crate::{AudioFormat, SynthesisAdapter};

    #[test]
    fn spreads_time_by_token_count() {
        let stamps = spread_over_words(&["a", "bbb"], &[1, 3], 2.0);
        assert_eq!(stamps[0].start, 0.0);
        assert_eq!(stamps[0].end, 0.5);
        assert_eq!(stamps[1].start, 0.5);
        assert_eq!(stamps[1].end, 2.0);
    }

    #[test]
    fn timestamps_are_monotonic_with_empty_words() {
        let stamps = spread_over_words(&["x", "—", "y", "z"], &[2, 0, 5, 1], 1.234);
        for pair in stamps.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
        assert!(stamps.iter().all(|s| s.end >= s.start));
        assert_eq!(stamps[1].start, stamps[1].end);
        assert_eq!(stamps.last().unwrap().end, 1.234);
    }

    #[test]
    fn falls_back_to_even_split_without_counts() {
        let stamps = spread_over_words(&["one", "two"], &[], 1.0);
        assert_eq!(stamps[0].end, 0.5);
        assert_eq!(stamps[1].end, 1.0);
    }

    #[test]
    fn unloaded_engine_reports_synthesis_failure() {
        let mut engine = KokoroEngine::new();
        assert!(!engine.is_loaded());
        let err = engine
            .synthesize("Hi", "af_bella", 1.0, AudioFormat::Wav)
            .unwrap_err();
        assert!(err.detail().contains("Model not loaded"));
        assert!(engine.list_voices().is_err());
    }

    #[test]
    fn rejects_unknown_language_code() {
        let mut engine = KokoroEngine::new();
        let err = engine.text_to_phonemes("Hi", "q").unwrap_err();
        assert!(err.detail().contains("Unsupported language code 'q'"));
    }
}
