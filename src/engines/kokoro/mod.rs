//! Kokoro-82M synthesis adapter.
//!
//! Runs the Kokoro-82M ONNX model locally and uses espeak-ng for
//! phonemization.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed, or bundled and passed in through
//! [`EspeakConfig`]:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Model Directory Layout
//!
//! ```text
//! models/kokoro/
//! ├── kokoro-quant-convinteger.onnx   # 8-bit quantized model (88MB, CPU-optimized)
//! ├── voices-v1.0.bin                  # Voice data archive (.npz format)
//! └── config.json                      # Optional, vocab override
//! ```
//!
//! # Voices and Languages
//!
//! Voices are named `{language}{gender}_{name}`, e.g. `af_bella` (American
//! English, female). The first letter doubles as the Kokoro language code
//! accepted by the `phonemize` route:
//!
//! | Code | Language | espeak-ng |
//! |---|---|---|
//! | `a` | American English | `en-us` |
//! | `b` | British English | `en-gb` |
//! | `e` | Spanish | `es` |
//! | `f` | French | `fr` |
//! | `h` | Hindi | `hi` |
//! | `i` | Italian | `it` |
//! | `j` | Japanese | `ja` |
//! | `p` | Brazilian Portuguese | `pt-br` |
//! | `z` | Mandarin Chinese | `cmn` |
//!
//! A voice may be a blend such as `af_bella+af_sky`; the style vectors of
//! the listed voices are averaged. `combine_voices` returns the averaged
//! table as a `.npy` file.
//!
//! Word timestamps are estimated: each word's share of the audio is
//! proportional to its phoneme token count.

pub mod engine;
pub mod model;
pub mod phonemizer;
pub mod vocab;
pub mod voices;

pub use engine::{KokoroEngine, KokoroModelParams};
pub use model::KokoroError;
pub use phonemizer::EspeakConfig;
