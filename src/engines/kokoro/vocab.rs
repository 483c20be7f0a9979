use std::collections::HashMap;
use std::path::Path;

use super::model::KokoroError;

/// Token ids of `; : , . ! ?` in the Kokoro vocabulary. Chunks prefer to
/// break after one of these.
pub const PUNCTUATION_IDS: &[i64] = &[1, 2, 3, 4, 5, 6];

/// Kokoro v1.0 vocabulary, used when the model directory has no config.json.
#[rustfmt::skip]
static BUILTIN_VOCAB: &[(char, i64)] = &[
    (';', 1), (':', 2), (',', 3), ('.', 4), ('!', 5), ('?', 6),
    ('—', 9), ('…', 10), ('"', 11), ('(', 12), (')', 13), ('\u{201c}', 14),
    ('\u{201d}', 15), (' ', 16), ('\u{0303}', 17), ('ʣ', 18), ('ʥ', 19), ('ʦ', 20),
    ('ʨ', 21), ('ᵝ', 22), ('ꭧ', 23), ('A', 24), ('I', 25), ('O', 31),
    ('Q', 33), ('S', 35), ('T', 36), ('W', 39), ('Y', 41), ('ᵊ', 42),
    ('a', 43), ('b', 44), ('c', 45), ('d', 46), ('e', 47), ('f', 48),
    ('h', 50), ('i', 51), ('j', 52), ('k', 53), ('l', 54), ('m', 55),
    ('n', 56), ('o', 57), ('p', 58), ('q', 59), ('r', 60), ('s', 61),
    ('t', 62), ('u', 63), ('v', 64), ('w', 65), ('x', 66), ('y', 67),
    ('z', 68), ('ɑ', 69), ('ɐ', 70), ('ɒ', 71), ('æ', 72), ('β', 75),
    ('ɔ', 76), ('ɕ', 77), ('ç', 78), ('ɖ', 80), ('ð', 81), ('ʤ', 82),
    ('ə', 83), ('ɚ', 85), ('ɛ', 86), ('ɜ', 87), ('ɟ', 90), ('ɡ', 92),
    ('ɥ', 99), ('ɨ', 101), ('ɪ', 102), ('ʝ', 103), ('ɯ', 110), ('ɰ', 111),
    ('ŋ', 112), ('ɳ', 113), ('ɲ', 114), ('ɴ', 115), ('ø', 116), ('ɸ', 118),
    ('θ', 119), ('œ', 120), ('ɹ', 123), ('ɾ', 125), ('ɻ', 126), ('ʁ', 128),
    ('ɽ', 129), ('ʂ', 130), ('ʃ', 131), ('ʈ', 132), ('ʧ', 133), ('ʊ', 135),
    ('ʋ', 136), ('ʌ', 138), ('ɣ', 139), ('ɤ', 140), ('χ', 142), ('ʎ', 143),
    ('ʒ', 147), ('ʔ', 148), ('ˈ', 156), ('ˌ', 157), ('ː', 158), ('ʰ', 162),
    ('ʲ', 164), ('↓', 169), ('→', 171), ('↗', 172), ('↘', 173), ('ᵻ', 177),
];

pub fn builtin_vocab() -> HashMap<char, i64> {
    BUILTIN_VOCAB.iter().copied().collect()
}

/// Load the vocabulary from the `"vocab"` table of a Kokoro config.json,
/// which maps single-character strings to token ids.
pub fn load_vocab(config_path: &Path) -> Result<HashMap<char, i64>, KokoroError> {
    let content = std::fs::read_to_string(config_path)?;
    parse_vocab(&content)
}

fn parse_vocab(content: &str) -> Result<HashMap<char, i64>, KokoroError> {
    let json: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| KokoroError::Config(format!("Failed to parse JSON: {e}")))?;

    let table = json
        .get("vocab")
        .ok_or_else(|| KokoroError::Config("Missing 'vocab' field".to_string()))?
        .as_object()
        .ok_or_else(|| KokoroError::Config("'vocab' must be an object".to_string()))?;

    table
        .iter()
        .map(|(key, value)| {
            let ch = key
                .chars()
                .next()
                .ok_or_else(|| KokoroError::Config(format!("Empty key in vocab: {key:?}")))?;
            let id = value.as_i64().ok_or_else(|| {
                KokoroError::Config(format!("Non-integer vocab value for key {key:?}"))
            })?;
            Ok((ch, id))
        })
        .collect()
}

/// Map IPA text to token ids. espeak-ng's `_` word joiners and line breaks
/// are skipped, and so is anything outside the vocabulary.
pub fn encode_phonemes(ipa: &str, vocab: &HashMap<char, i64>) -> Vec<i64> {
    ipa.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .flat_map(|line| line.chars())
        .filter(|&ch| ch != '_')
        .filter_map(|ch| vocab.get(&ch).copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{builtin_vocab, encode_phonemes, parse_vocab, PUNCTUATION_IDS};

    #[test]
    fn builtin_vocab_has_punctuation_ids() {
        let vocab = builtin_vocab();
        for (ch, id) in [';', ':', ',', '.', '!', '?'].iter().zip(PUNCTUATION_IDS) {
            assert_eq!(vocab.get(ch), Some(id));
        }
        assert_eq!(vocab.get(&'ə'), Some(&83));
    }

    #[test]
    fn encodes_ipa_skipping_unknown_symbols() {
        let vocab = builtin_vocab();
        let ids = encode_phonemes("hə_lˈoʊ\n\n§", &vocab);
        assert_eq!(ids, vec![50, 83, 54, 156, 57, 135]);
    }

    #[test]
    fn parses_vocab_from_config_json() {
        let vocab = parse_vocab(r#"{"vocab": {"a": 43, "ə": 83}}"#).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.get(&'a'), Some(&43));
        assert!(parse_vocab(r#"{"vocab": {"a": "x"}}"#).is_err());
        assert!(parse_vocab(r#"{"other": {}}"#).is_err());
    }
}
