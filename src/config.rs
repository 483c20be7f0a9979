use derive_builder::Builder;

/// Kokoro language codes accepted by the `phonemize` route by default.
///
/// `a` American English, `b` British English, `e` Spanish, `f` French,
/// `h` Hindi, `i` Italian, `j` Japanese, `p` Brazilian Portuguese.
/// Mandarin (`z`) needs a separate G2P backend and is left out.
pub const DEFAULT_LANGUAGES: &[&str] = &["a", "b", "e", "f", "h", "i", "j", "p"];

/// Defaults applied by the parameter normalizer.
///
/// ```
/// use kokoro_dispatch::DispatcherConfigBuilder;
///
/// let config = DispatcherConfigBuilder::default()
///     .default_voice("bf_emma")
///     .default_language("b")
///     .build()?;
/// assert_eq!(config.model_name, "kokoro");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(default, setter(into), build_fn(validate = "Self::validate"))]
pub struct DispatcherConfig {
    /// Voice used when a job does not name one.
    pub default_voice: String,
    /// Language code used by `phonemize` when a job does not name one.
    pub default_language: String,
    /// Model name echoed back on speech envelopes.
    pub model_name: String,
    /// Language codes `phonemize` accepts.
    pub supported_languages: Vec<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_voice: "af_bella".to_string(),
            default_language: "a".to_string(),
            model_name: "kokoro".to_string(),
            supported_languages: DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DispatcherConfig {
    pub fn supports_language(&self, code: &str) -> bool {
        self.supported_languages.iter().any(|lang| lang == code)
    }
}

impl DispatcherConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(voice) = &self.default_voice {
            if voice.trim().is_empty() {
                return Err("default_voice must not be empty".to_string());
            }
        }

        let defaults = DispatcherConfig::default();
        let supported = self
            .supported_languages
            .as_ref()
            .unwrap_or(&defaults.supported_languages);
        let language = self
            .default_language
            .as_ref()
            .unwrap_or(&defaults.default_language);
        if !supported.contains(language) {
            return Err(format!(
                "default_language '{language}' is not one of the supported languages {supported:?}"
            ));
        }

        Ok(())
    }
}
