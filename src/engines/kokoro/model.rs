use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::phonemizer::{phonemize, phonemize_words, EspeakConfig};
use super::vocab::{encode_phonemes, PUNCTUATION_IDS};
use super::voices::{StyleTable, VoiceStore, STYLE_DIM};

/// Maximum number of phoneme tokens per chunk (before padding).
pub const MAX_PHONEME_LEN: usize = 510;

/// Output sample rate from the Kokoro model.
pub const SAMPLE_RATE: u32 = 24000;

/// Crossfade (in samples) used when concatenating chunk audio.
const CHUNK_CROSSFADE_SAMPLES: usize = 240; // 10ms @ 24kHz

const VOICES_FILE: &str = "voices-v1.0.bin";
const PREFERRED_ONNX_FILE: &str = "kokoro-quant-convinteger.onnx";

#[derive(thiserror::Error, Debug)]
pub enum KokoroError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Audio encoding error: {0}")]
    Audio(#[from] hound::Error),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Voice '{0}' not found. Use the list-voices endpoint to see available voices.")]
    VoiceNotFound(String),
    #[error("Invalid voice blend '{0}'")]
    InvalidBlend(String),
    #[error("Unsupported language code '{0}'")]
    UnsupportedLanguage(String),
    #[error("Model not loaded. Call load_model() first.")]
    ModelNotLoaded,
    #[error("Invalid config.json: {0}")]
    Config(String),
    #[error("Failed to parse voice file: {0}")]
    VoiceParse(String),
}

/// Names and types of the ONNX graph inputs, which differ between exports.
#[derive(Debug)]
struct InputLayout {
    /// "input_ids" or "tokens"
    tokens: String,
    /// True if the speed input expects int32, false for float32
    speed_is_int32: bool,
}

impl InputLayout {
    fn detect(session: &Session) -> Self {
        let tokens = session
            .inputs()
            .iter()
            .map(|input| input.name())
            .find(|name| *name == "input_ids" || *name == "tokens")
            .unwrap_or("input_ids")
            .to_string();

        // Modern Kokoro exports take int32 speed
        let speed_is_int32 = session
            .inputs()
            .iter()
            .find(|input| input.name() == "speed")
            .map(|input| {
                let dtype = format!("{:?}", input.dtype());
                dtype.contains("Int32") || dtype.contains("int32")
            })
            .unwrap_or(true);

        Self {
            tokens,
            speed_is_int32,
        }
    }
}

/// Loaded Kokoro ONNX session plus the voice styles and vocabulary it needs.
pub struct KokoroModel {
    session: Session,
    voice_store: VoiceStore,
    vocab: HashMap<char, i64>,
    layout: InputLayout,
}

impl KokoroModel {
    /// Load the Kokoro model from a directory.
    ///
    /// The directory must contain an `.onnx` file (preferably
    /// `kokoro-quant-convinteger.onnx`) and the `voices-v1.0.bin` archive.
    /// A `config.json` with a `vocab` table is used when present.
    pub fn load(
        model_dir: &Path,
        num_threads: Option<usize>,
        optimized_cache_path: Option<&Path>,
    ) -> Result<Self, KokoroError> {
        let onnx_path = find_onnx_file(model_dir)?;
        log::info!("Loading Kokoro model from {}", onnx_path.display());

        let session = init_session(&onnx_path, num_threads, optimized_cache_path)?;
        let layout = InputLayout::detect(&session);
        log::info!("Detected input layout: {layout:?}");

        let voices_path = model_dir.join(VOICES_FILE);
        if !voices_path.exists() {
            return Err(KokoroError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "Voice file not found at {}. Download it from the Kokoro model repository.",
                    voices_path.display()
                ),
            )));
        }
        let voice_store = VoiceStore::load(&voices_path)?;

        let config_path = model_dir.join("config.json");
        let vocab = if config_path.exists() {
            log::info!("Loading vocab from config.json");
            super::vocab::load_vocab(&config_path)?
        } else {
            log::warn!("config.json not found, using built-in vocab");
            super::vocab::builtin_vocab()
        };

        Ok(Self {
            session,
            voice_store,
            vocab,
            layout,
        })
    }

    /// Synthesize text with a voice (or `+`-joined blend). The espeak-ng
    /// language follows the first voice in the blend.
    pub fn synthesize_text(
        &mut self,
        text: &str,
        voice: &str,
        speed: f32,
        espeak: &EspeakConfig,
    ) -> Result<Vec<f32>, KokoroError> {
        let lang = super::phonemizer::voice_lang(voice);
        let ids = phonemize(text, lang, &self.vocab, espeak)?;
        if ids.is_empty() {
            log::warn!("No phoneme tokens produced for {} chars of text", text.len());
            return Ok(Vec::new());
        }
        self.synthesize_ids(&ids, voice, speed)
    }

    /// Synthesize an IPA phoneme string directly, skipping espeak-ng.
    pub fn synthesize_phonemes(
        &mut self,
        phonemes: &str,
        voice: &str,
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        let ids = encode_phonemes(phonemes, &self.vocab);
        if ids.is_empty() {
            return Err(KokoroError::PhonemizerFailed(
                "no known phoneme symbols in input".to_string(),
            ));
        }
        self.synthesize_ids(&ids, voice, speed)
    }

    /// Token count of each word, for spreading audio time across words.
    pub fn word_token_counts(
        &self,
        words: &[&str],
        voice: &str,
        espeak: &EspeakConfig,
    ) -> Result<Vec<usize>, KokoroError> {
        let lang = super::phonemizer::voice_lang(voice);
        Ok(phonemize_words(words, lang, &self.vocab, espeak)?
            .iter()
            .map(Vec::len)
            .collect())
    }

    /// Blend voices into one style table.
    pub fn combine_voices(&self, voices: &[String]) -> Result<StyleTable, KokoroError> {
        let ids: Vec<&str> = voices.iter().map(String::as_str).collect();
        self.voice_store.blend(&ids)
    }

    pub fn list_voices(&self) -> Vec<&str> {
        self.voice_store.list_voices()
    }

    fn synthesize_ids(
        &mut self,
        ids: &[i64],
        voice: &str,
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        let styles = self.voice_store.resolve(voice)?;

        // One style index for the whole utterance keeps prosody stable across chunks.
        let style = styles.style_at(ids.len());

        if self.layout.speed_is_int32 {
            let rounded = int32_speed(speed);
            if rounded as f32 != speed {
                log::warn!("Model takes an integer speed; requested {speed} runs as {rounded}");
            }
        }

        let chunks = if ids.len() > MAX_PHONEME_LEN {
            log::debug!(
                "Phoneme sequence exceeded limit ({} > {MAX_PHONEME_LEN}), chunking",
                ids.len()
            );
            split_chunks(ids)
        } else {
            vec![ids.to_vec()]
        };

        let mut combined = Vec::with_capacity(ids.len() * 300);
        for chunk in &chunks {
            let audio = self.run_chunk(chunk, &style, speed)?;
            if audio.is_empty() {
                continue;
            }
            append_with_crossfade(&mut combined, &audio, CHUNK_CROSSFADE_SAMPLES);
        }
        Ok(combined)
    }

    /// Run ONNX inference on a single chunk of phoneme token IDs.
    fn run_chunk(
        &mut self,
        tokens: &[i64],
        style: &[f32; STYLE_DIM],
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        // Pad to [[0, t1..tN, 0]]
        let mut padded = Vec::with_capacity(tokens.len() + 2);
        padded.push(0);
        padded.extend_from_slice(tokens);
        padded.push(0);
        let seq_len = padded.len();
        let tokens_arr = Array2::from_shape_vec((1, seq_len), padded)?;
        let style_view = ndarray::ArrayView2::from_shape((1, STYLE_DIM), style.as_slice())?;
        let tokens_name = self.layout.tokens.as_str();

        let output = if self.layout.speed_is_int32 {
            let speed_arr = ndarray::arr1(&[int32_speed(speed)]);
            self.session.run(inputs![
                tokens_name => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ])?
        } else {
            let speed_arr = ndarray::arr1(&[speed]);
            self.session.run(inputs![
                tokens_name => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ])?
        };

        let (_, waveform) = output
            .iter()
            .next()
            .ok_or_else(|| KokoroError::Ort(ort::Error::new("No output from model")))?;
        let waveform = waveform.try_extract_array::<f32>()?;
        Ok(waveform.iter().copied().collect())
    }
}

/// Speed as fed to exports whose `speed` input is int32.
fn int32_speed(speed: f32) -> i32 {
    speed.round() as i32
}

/// Prefer `kokoro-quant-convinteger.onnx`, else the first `.onnx` file found.
fn find_onnx_file(model_dir: &Path) -> Result<PathBuf, KokoroError> {
    let preferred = model_dir.join(PREFERRED_ONNX_FILE);
    if preferred.exists() {
        return Ok(preferred);
    }

    for entry in std::fs::read_dir(model_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("onnx") {
            log::info!("Using ONNX file: {}", path.display());
            return Ok(path);
        }
    }

    Err(KokoroError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("No .onnx file found in {}", model_dir.display()),
    )))
}

/// Build the ONNX session.
///
/// With a cache path, the first load runs Level3 optimization and writes the
/// optimized graph there; later loads read it back with optimization
/// disabled, which takes cold start from several seconds to under one.
fn init_session(
    onnx_path: &Path,
    num_threads: Option<usize>,
    optimized_cache_path: Option<&Path>,
) -> Result<Session, KokoroError> {
    let mut builder = Session::builder()?
        .with_execution_providers([CPUExecutionProvider::default().build()])?
        .with_parallel_execution(true)?;

    let load_path = match optimized_cache_path {
        Some(cache) if cache.exists() => {
            log::info!("Loading pre-optimized Kokoro graph from {}", cache.display());
            builder = builder.with_optimization_level(GraphOptimizationLevel::Disable)?;
            cache
        }
        Some(cache) => {
            log::info!(
                "First load: running Level3 optimization; saving graph to {}",
                cache.display()
            );
            builder = builder
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_optimized_model_path(cache)?;
            onnx_path
        }
        None => {
            builder = builder.with_optimization_level(GraphOptimizationLevel::Level3)?;
            onnx_path
        }
    };

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(load_path)?)
}

/// Split phoneme IDs into chunks of at most `MAX_PHONEME_LEN`, breaking after
/// the last punctuation token in each window when there is one.
fn split_chunks(ids: &[i64]) -> Vec<Vec<i64>> {
    let mut chunks = Vec::new();
    let mut rest = ids;

    while rest.len() > MAX_PHONEME_LEN {
        let window = &rest[..MAX_PHONEME_LEN];
        let split = window
            .iter()
            .rposition(|id| PUNCTUATION_IDS.contains(id))
            .map(|i| i + 1)
            .unwrap_or(MAX_PHONEME_LEN);
        chunks.push(rest[..split].to_vec());
        rest = &rest[split..];
    }
    if !rest.is_empty() {
        chunks.push(rest.to_vec());
    }

    chunks
}

fn append_with_crossfade(dst: &mut Vec<f32>, src: &[f32], crossfade_samples: usize) {
    let overlap = crossfade_samples.min(dst.len()).min(src.len());
    let dst_start = dst.len() - overlap;
    for (i, &incoming) in src[..overlap].iter().enumerate() {
        let t = (i + 1) as f32 / (overlap as f32 + 1.0);
        let existing = &mut dst[dst_start + i];
        *existing = *existing * (1.0 - t) + incoming * t;
    }
    dst.extend_from_slice(&src[overlap..]);
}
