//! Synthesis adapters.
//!
//! The dispatcher only sees [`SynthesisAdapter`](crate::SynthesisAdapter);
//! concrete engines live here and are enabled via Cargo features:
//! - `kokoro` - Kokoro-82M (ONNX format, espeak-ng required)

#[cfg(feature = "kokoro")]
pub mod kokoro;
