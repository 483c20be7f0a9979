use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use super::model::KokoroError;
use super::vocab::encode_phonemes;

/// Where to find espeak-ng. `None` fields fall back to the system install.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    /// espeak-ng binary; defaults to `espeak-ng` on PATH
    pub bin_path: Option<PathBuf>,
    /// espeak-ng data directory, exported as `ESPEAK_DATA_PATH`
    pub data_path: Option<PathBuf>,
}

impl EspeakConfig {
    fn command(&self) -> Command {
        let mut command = match &self.bin_path {
            Some(bin) => Command::new(bin),
            None => Command::new("espeak-ng"),
        };
        if let Some(data) = &self.data_path {
            command.env("ESPEAK_DATA_PATH", data);
        }
        command
    }
}

/// Map a voice name (or the first voice of a blend) to an espeak-ng
/// language. Voice names follow `{prefix}_{name}`; the prefix's first letter
/// is the Kokoro language code.
pub fn voice_lang(voice: &str) -> &'static str {
    voice
        .trim()
        .chars()
        .next()
        .and_then(|code| language_to_espeak(&code.to_string()))
        .unwrap_or("en-us")
}

/// Map a one-letter Kokoro language code to an espeak-ng language.
pub fn language_to_espeak(code: &str) -> Option<&'static str> {
    let lang = match code {
        "a" => "en-us",
        "b" => "en-gb",
        "e" => "es",
        "f" => "fr",
        "h" => "hi",
        "i" => "it",
        "j" => "ja",
        "p" => "pt-br",
        "z" => "cmn",
        _ => return None,
    };
    Some(lang)
}

/// Convert text to Kokoro phoneme token ids via espeak-ng.
///
/// Boundary punctuation is kept as its own token so the model pauses on it;
/// characters outside the vocabulary are dropped.
pub fn phonemize(
    text: &str,
    lang: &str,
    vocab: &HashMap<char, i64>,
    espeak: &EspeakConfig,
) -> Result<Vec<i64>, KokoroError> {
    let mut ids = Vec::new();
    for part in phonemize_parts(text, lang, espeak)? {
        match part {
            PhonemePart::Ipa(ipa) => ids.extend(encode_phonemes(&ipa, vocab)),
            PhonemePart::Punct(ch) => ids.extend(vocab.get(&ch).copied()),
        }
    }
    Ok(ids)
}

/// Convert text to an IPA phoneme string via espeak-ng, keeping boundary
/// punctuation in place.
pub fn phonemize_ipa(text: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, KokoroError> {
    let mut out = String::new();
    for part in phonemize_parts(text, lang, espeak)? {
        match part {
            PhonemePart::Ipa(ipa) => {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(&clean_ipa(&ipa));
            }
            PhonemePart::Punct(ch) => out.push(ch),
        }
    }
    Ok(out)
}

/// Phonemize each word on its own, in one espeak-ng run.
pub fn phonemize_words(
    words: &[&str],
    lang: &str,
    vocab: &HashMap<char, i64>,
    espeak: &EspeakConfig,
) -> Result<Vec<Vec<i64>>, KokoroError> {
    if words.is_empty() {
        return Ok(Vec::new());
    }
    Ok(run_espeak_batch(words, lang, espeak)?
        .iter()
        .map(|ipa| encode_phonemes(ipa, vocab))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TextPart {
    Text(String),
    Punct(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PhonemePart {
    Ipa(String),
    Punct(char),
}

fn phonemize_parts(
    text: &str,
    lang: &str,
    espeak: &EspeakConfig,
) -> Result<Vec<PhonemePart>, KokoroError> {
    let parts = split_text_parts(text);
    let segments: Vec<&str> = parts
        .iter()
        .filter_map(|part| match part {
            TextPart::Text(segment) => Some(segment.as_str()),
            TextPart::Punct(_) => None,
        })
        .collect();

    let mut ipa = if segments.is_empty() {
        Vec::new()
    } else {
        run_espeak_batch(&segments, lang, espeak)?
    }
    .into_iter();

    Ok(parts
        .into_iter()
        .map(|part| match part {
            TextPart::Text(_) => PhonemePart::Ipa(ipa.next().unwrap_or_default()),
            TextPart::Punct(ch) => PhonemePart::Punct(ch),
        })
        .collect())
}

fn split_text_parts(text: &str) -> Vec<TextPart> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        if let Some(punct) = boundary_punctuation(ch) {
            if !is_numeric_separator(text, idx, ch) {
                flush_text_part(&mut parts, &mut current);
                parts.push(TextPart::Punct(punct));
                continue;
            }
        }

        if ch.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }

        current.push(ch);
    }

    flush_text_part(&mut parts, &mut current);
    parts
}

fn flush_text_part(parts: &mut Vec<TextPart>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(TextPart::Text(trimmed.to_string()));
    }
    current.clear();
}

fn boundary_punctuation(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' | '—' | '…' | '"' | '(' | ')' | '\u{201c}'
        | '\u{201d}' => Some(ch),
        '\n' | '\r' => Some('.'),
        _ => None,
    }
}

/// `.` and `,` between two digits belong to a number ("2.0", "1,000").
fn is_numeric_separator(text: &str, idx: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }
    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch.len_utf8()..].chars().next();
    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

fn clean_ipa(ipa: &str) -> String {
    ipa.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace('_', "")
}

/// One espeak-ng call for all segments, one output line per input line. If
/// the line counts disagree, fall back to one call per segment.
fn run_espeak_batch(
    segments: &[&str],
    lang: &str,
    espeak: &EspeakConfig,
) -> Result<Vec<String>, KokoroError> {
    let output = run_espeak(&segments.join("\n"), lang, espeak)?;
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() == segments.len() {
        return Ok(lines.into_iter().map(str::to_string).collect());
    }

    log::debug!(
        "espeak-ng returned {} lines for {} segments, retrying one by one",
        lines.len(),
        segments.len()
    );
    segments
        .iter()
        .map(|segment| run_espeak(segment, lang, espeak))
        .collect()
}

fn run_espeak(input: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, KokoroError> {
    let mut child = espeak
        .command()
        .args(["--ipa", "--stdin", "-q", "-v", lang])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KokoroError::EspeakNotFound
            } else {
                KokoroError::Io(e)
            }
        })?;

    // Feed stdin from its own thread so a full stdout pipe cannot stall us.
    let writer = child.stdin.take().map(|mut stdin| {
        let payload = newline_terminated(input).into_owned();
        thread::spawn(move || stdin.write_all(payload.as_bytes()))
    });

    let output = child.wait_with_output()?;
    let written = match writer {
        Some(writer) => writer
            .join()
            .map_err(|_| KokoroError::PhonemizerFailed("stdin writer panicked".to_string()))?,
        None => Ok(()),
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(KokoroError::PhonemizerFailed(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }
    written?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// espeak-ng under-processes a final line that has no terminator.
fn newline_terminated(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;
    use crate::engines::kokoro::vocab::builtin_vocab;

    fn espeak_available() -> bool {
        Command::new("espeak-ng").arg("--version").output().is_ok()
    }

    #[test]
    fn splits_text_and_punctuation_parts() {
        assert_eq!(
            split_text_parts("Hello, world. Testing!"),
            vec![
                TextPart::Text("Hello".to_string()),
                TextPart::Punct(','),
                TextPart::Text("world".to_string()),
                TextPart::Punct('.'),
                TextPart::Text("Testing".to_string()),
                TextPart::Punct('!'),
            ]
        );
    }

    #[test]
    fn keeps_numeric_separators_inside_text() {
        assert_eq!(
            split_text_parts("Version 2.0 reached 1,000 users.\nDone"),
            vec![
                TextPart::Text("Version 2.0 reached 1,000 users".to_string()),
                TextPart::Punct('.'),
                TextPart::Punct('.'),
                TextPart::Text("Done".to_string()),
            ]
        );
    }

    #[test]
    fn maps_voices_and_codes_to_espeak_languages() {
        assert_eq!(voice_lang("bf_emma"), "en-gb");
        assert_eq!(voice_lang("jf_alpha+af_sky"), "ja");
        assert_eq!(voice_lang("xx_unknown"), "en-us");
        assert_eq!(language_to_espeak("p"), Some("pt-br"));
        assert_eq!(language_to_espeak("q"), None);
    }

    #[test]
    fn cleans_espeak_ipa_output() {
        assert_eq!(clean_ipa(" hə_lˈoʊ \n\n wˈɜːld\n"), "həlˈoʊ wˈɜːld");
    }

    #[test]
    fn terminates_stdin_payload_once() {
        assert_eq!(newline_terminated("America"), "America\n");
        assert_eq!(newline_terminated("America\n"), "America\n");
    }

    #[test]
    fn phonemize_keeps_terminal_schwa_for_america() {
        if !espeak_available() {
            return;
        }
        let vocab = builtin_vocab();
        let ids = phonemize("America", "en-us", &vocab, &EspeakConfig::default())
            .expect("phonemize should succeed");
        assert_eq!(ids.last(), vocab.get(&'ə'));
    }

    #[test]
    fn ipa_string_keeps_punctuation() {
        if !espeak_available() {
            return;
        }
        let ipa = phonemize_ipa("Hello, world!", "en-us", &EspeakConfig::default())
            .expect("phonemize should succeed");
        assert!(ipa.contains(','));
        assert!(ipa.ends_with('!'));
        assert!(!ipa.contains('_'));
    }

    #[test]
    fn large_input_does_not_stall_on_pipes() {
        if !espeak_available() {
            return;
        }
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(4000);
        let ipa = phonemize_ipa(&text, "en-us", &EspeakConfig::default())
            .expect("phonemize should succeed");
        assert!(ipa.len() > 64 * 1024);
        assert!(ipa.ends_with('.'));
    }

    #[test]
    fn words_are_phonemized_one_per_entry() {
        if !espeak_available() {
            return;
        }
        let vocab = builtin_vocab();
        let ids = phonemize_words(&["hello", "world"], "en-us", &vocab, &EspeakConfig::default())
            .expect("phonemize should succeed");
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|word| !word.is_empty()));
    }
}
