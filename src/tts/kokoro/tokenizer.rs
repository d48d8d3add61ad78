use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use lazy_static::lazy_static;

use crate::error::AppError;

/// Kokoro accepts at most this many tokens per inference pass.
pub const MAX_TOKENS: usize = 510;

/// Phoneme symbol -> token id, as baked into the Kokoro v1.0 model.
const VOCAB: &[(char, i64)] = &[
    (';', 1), (':', 2), (',', 3), ('.', 4), ('!', 5), ('?', 6), ('—', 9), ('…', 10),
    ('"', 11), ('(', 12), (')', 13), ('“', 14), ('”', 15), (' ', 16), ('\u{0303}', 17),
    ('ʣ', 18), ('ʥ', 19), ('ʦ', 20), ('ʨ', 21), ('ᵝ', 22), ('\u{AB67}', 23), ('A', 24),
    ('I', 25), ('O', 31), ('Q', 33), ('S', 35), ('T', 36), ('W', 39), ('Y', 41),
    ('ᵊ', 42), ('a', 43), ('b', 44), ('c', 45), ('d', 46), ('e', 47), ('f', 48),
    ('h', 50), ('i', 51), ('j', 52), ('k', 53), ('l', 54), ('m', 55), ('n', 56),
    ('o', 57), ('p', 58), ('q', 59), ('r', 60), ('s', 61), ('t', 62), ('u', 63),
    ('v', 64), ('w', 65), ('x', 66), ('y', 67), ('z', 68), ('ɑ', 69), ('ɐ', 70),
    ('ɒ', 71), ('æ', 72), ('β', 75), ('ɔ', 76), ('ɕ', 77), ('ç', 78), ('ɖ', 80),
    ('ð', 81), ('ʤ', 82), ('ə', 83), ('ɚ', 85), ('ɛ', 86), ('ɜ', 87), ('ɟ', 90),
    ('ɡ', 92), ('ɥ', 99), ('ɨ', 101), ('ɪ', 102), ('ʝ', 103), ('ɯ', 110), ('ɰ', 111),
    ('ŋ', 112), ('ɳ', 113), ('ɲ', 114), ('ɴ', 115), ('ø', 116), ('ɸ', 118), ('θ', 119),
    ('œ', 120), ('ɹ', 123), ('ɾ', 125), ('ɻ', 126), ('ʁ', 128), ('ɽ', 129), ('ʂ', 130),
    ('ʃ', 131), ('ʈ', 132), ('ʧ', 133), ('ʊ', 135), ('ʋ', 136), ('ʌ', 138), ('ɣ', 139),
    ('ɤ', 140), ('χ', 142), ('ʎ', 143), ('ʒ', 147), ('ʔ', 148), ('ˈ', 156), ('ˌ', 157),
    ('ː', 158), ('ʰ', 162), ('ʲ', 164), ('↓', 169), ('→', 171), ('↗', 172), ('↘', 173),
    ('ᵻ', 177),
];

/// Voice id prefix letter -> espeak-ng language.
const LANGUAGES: &[(char, &str)] = &[
    ('a', "en-us"),
    ('b', "en-gb"),
    ('e', "es"),
    ('f', "fr-fr"),
    ('h', "hi"),
    ('i', "it"),
    ('j', "ja"),
    ('p', "pt-br"),
    ('z', "cmn"),
];

lazy_static! {
    static ref VOCAB_MAP: HashMap<char, i64> = VOCAB.iter().copied().collect();
}

/// espeak-ng language for a voice such as `af_heart` (American English).
pub fn language_for_voice(voice: &str) -> &'static str {
    voice
        .chars()
        .next()
        .and_then(|prefix| LANGUAGES.iter().find(|(p, _)| *p == prefix))
        .map(|(_, lang)| *lang)
        .unwrap_or("en-us")
}

/// Convert text to IPA phonemes using espeak-ng
pub fn phonemize(espeak_bin: &Path, text: &str, language: &str) -> Result<String, AppError> {
    if text.trim().is_empty() {
        return Ok(String::new());
    }

    let mut child = Command::new(espeak_bin)
        .args(["--ipa", "-q", "--stdin", "-v", language])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            AppError::Engine(format!(
                "Failed to run {} (is it installed?): {}",
                espeak_bin.display(),
                e
            ))
        })?;

    // Text must never reach argv. Feed stdin while output is being drained
    let output = std::thread::scope(|scope| {
        let writer = child.stdin.take().map(|mut stdin| {
            scope.spawn(move || match stdin.write_all(text.as_bytes()) {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            })
        });
        let output = child.wait_with_output();
        if let Some(Ok(Err(e))) = writer.map(|handle| handle.join()) {
            return Err(e);
        }
        output
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Engine(format!("espeak-ng failed: {}", stderr)));
    }

    // espeak breaks clauses onto separate lines
    let phonemes = String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    Ok(phonemes)
}

/// Map phonemes to token ids, dropping symbols the model does not know.
pub fn tokenize(phonemes: &str) -> Vec<i64> {
    phonemes
        .chars()
        .filter_map(|ch| VOCAB_MAP.get(&ch).copied())
        .collect()
}

/// Split a token stream into model-sized passes, preferring to break
/// after punctuation or a space.
pub fn chunk_tokens(tokens: &[i64]) -> Vec<&[i64]> {
    let space = VOCAB_MAP[&' '];
    let breaks = [VOCAB_MAP[&'.'], VOCAB_MAP[&'!'], VOCAB_MAP[&'?'], VOCAB_MAP[&','], space];

    let mut chunks = Vec::new();
    let mut rest = tokens;
    while rest.len() > MAX_TOKENS {
        let window = &rest[..MAX_TOKENS];
        let cut = window
            .iter()
            .rposition(|t| breaks.contains(t))
            .map(|pos| pos + 1)
            .filter(|&pos| pos > MAX_TOKENS / 2)
            .unwrap_or(MAX_TOKENS);
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for_voice() {
        assert_eq!(language_for_voice("af_heart"), "en-us");
        assert_eq!(language_for_voice("bf_emma"), "en-gb");
        assert_eq!(language_for_voice("ff_siwis"), "fr-fr");
        assert_eq!(language_for_voice("zf_xiaobei"), "cmn");
        assert_eq!(language_for_voice("xx_unknown"), "en-us");
        assert_eq!(language_for_voice(""), "en-us");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("həlˈoʊ"), vec![50, 83, 54, 156, 57, 135]);
        assert_eq!(tokenize("a b."), vec![43, 16, 44, 4]);
    }

    #[test]
    fn test_tokenize_drops_unknown_symbols() {
        assert_eq!(tokenize("a\u{1F600}b"), vec![43, 44]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_vocab_ids_unique() {
        let mut ids: Vec<i64> = VOCAB.iter().map(|(_, id)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), VOCAB.len());
        assert_eq!(VOCAB_MAP.len(), VOCAB.len());
    }

    #[test]
    fn test_chunk_short_input() {
        let tokens = vec![43; 20];
        let chunks = chunk_tokens(&tokens);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 20);
        assert!(chunk_tokens(&[]).is_empty());
    }

    #[test]
    fn test_chunk_long_input_breaks_on_space() {
        // words of 9 letters followed by a space
        let tokens: Vec<i64> = (0..120)
            .flat_map(|_| std::iter::repeat(43).take(9).chain(std::iter::once(16)))
            .collect();
        let chunks = chunk_tokens(&tokens);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= MAX_TOKENS));
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), tokens.len());
        assert_eq!(*chunks[0].last().unwrap(), 16);
    }

    #[test]
    fn test_chunk_without_breaks_hard_splits() {
        let tokens = vec![43; MAX_TOKENS * 2 + 7];
        let chunks = chunk_tokens(&tokens);
        let lengths: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lengths, vec![MAX_TOKENS, MAX_TOKENS, 7]);
    }

    #[test]
    fn test_missing_espeak_is_engine_error() {
        let result = phonemize(Path::new("/nonexistent/espeak-ng"), "hello", "en-us");
        assert!(matches!(result, Err(AppError::Engine(_))));
        assert_eq!(
            phonemize(Path::new("/nonexistent/espeak-ng"), "   ", "en-us").unwrap(),
            ""
        );
    }
}
