//! Kokoro phoneme vocabulary and batching.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Longest phoneme batch the model accepts in one pass.
pub const MAX_PHONEME_LENGTH: usize = 510;

/// Pad token placed at both ends of every batch.
pub const PAD_TOKEN: i64 = 0;

const PUNCTUATION: &[char] = &['.', ',', '!', '?', ';'];

#[rustfmt::skip]
const SYMBOLS: &[(char, i64)] = &[
    (';', 1), (':', 2), (',', 3), ('.', 4), ('!', 5), ('?', 6), ('—', 9), ('…', 10),
    ('"', 11), ('(', 12), (')', 13), ('“', 14), ('”', 15), (' ', 16), ('\u{0303}', 17),
    ('ʣ', 18), ('ʥ', 19), ('ʦ', 20), ('ʨ', 21), ('ᵝ', 22), ('\u{AB67}', 23),
    ('A', 24), ('I', 25), ('O', 31), ('Q', 33), ('S', 35), ('T', 36), ('W', 39), ('Y', 41),
    ('ᵊ', 42), ('a', 43), ('b', 44), ('c', 45), ('d', 46), ('e', 47), ('f', 48), ('h', 50),
    ('i', 51), ('j', 52), ('k', 53), ('l', 54), ('m', 55), ('n', 56), ('o', 57), ('p', 58),
    ('q', 59), ('r', 60), ('s', 61), ('t', 62), ('u', 63), ('v', 64), ('w', 65), ('x', 66),
    ('y', 67), ('z', 68), ('ɑ', 69), ('ɐ', 70), ('ɒ', 71), ('æ', 72), ('β', 75), ('ɔ', 76),
    ('ɕ', 77), ('ç', 78), ('ɖ', 80), ('ð', 81), ('ʤ', 82), ('ə', 83), ('ɚ', 85), ('ɛ', 86),
    ('ɜ', 87), ('ɟ', 90), ('ɡ', 92), ('ɥ', 99), ('ɨ', 101), ('ɪ', 102), ('ʝ', 103),
    ('ɯ', 110), ('ɰ', 111), ('ŋ', 112), ('ɳ', 113), ('ɲ', 114), ('ɴ', 115), ('ø', 116),
    ('ɸ', 118), ('θ', 119), ('œ', 120), ('ɹ', 123), ('ɾ', 125), ('ɻ', 126), ('ʁ', 128),
    ('ɽ', 129), ('ʂ', 130), ('ʃ', 131), ('ʈ', 132), ('ʧ', 133), ('ʊ', 135), ('ʋ', 136),
    ('ʌ', 138), ('ɣ', 139), ('ɤ', 140), ('χ', 142), ('ʎ', 143), ('ʒ', 147), ('ʔ', 148),
    ('ˈ', 156), ('ˌ', 157), ('ː', 158), ('ʰ', 162), ('ʲ', 164), ('↓', 169), ('→', 171),
    ('↗', 172), ('↘', 173), ('ᵻ', 177),
];

fn vocab() -> &'static HashMap<char, i64> {
    static VOCAB: OnceLock<HashMap<char, i64>> = OnceLock::new();
    VOCAB.get_or_init(|| SYMBOLS.iter().copied().collect())
}

/// Map phonemes to token ids, silently dropping symbols the model doesn't know.
pub fn tokenize(phonemes: &str) -> Vec<i64> {
    let vocab = vocab();
    phonemes.chars().filter_map(|c| vocab.get(&c).copied()).collect()
}

/// Split a phoneme string at punctuation into batches shorter than
/// [`MAX_PHONEME_LENGTH`] characters. Each batch becomes one audio chunk.
pub fn split_phonemes(phonemes: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in phonemes.chars() {
        if PUNCTUATION.contains(&c) {
            parts.push(std::mem::take(&mut current));
            parts.push(c.to_string());
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    let parts = parts.iter().flat_map(|p| wrap_long(p.trim()));

    let mut batches = Vec::new();
    let mut batch = String::new();
    let mut batch_len = 0usize;
    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let part_len = part.chars().count();

        if batch_len + part_len + 1 >= MAX_PHONEME_LENGTH {
            let done = batch.trim().to_string();
            if !done.is_empty() {
                batches.push(done);
            }
            batch = part.to_string();
            batch_len = part_len;
        } else if part.len() == 1 && part.chars().all(|c| PUNCTUATION.contains(&c)) {
            batch.push_str(part);
            batch_len += 1;
        } else {
            if !batch.is_empty() {
                batch.push(' ');
                batch_len += 1;
            }
            batch.push_str(part);
            batch_len += part_len;
        }
    }

    let done = batch.trim().to_string();
    if !done.is_empty() {
        batches.push(done);
    }
    batches
}

/// Break a clause with no punctuation that would not fit in a batch on its
/// own, preferring word boundaries.
fn wrap_long(part: &str) -> Vec<String> {
    let limit = MAX_PHONEME_LENGTH - 1;
    if part.chars().count() < limit {
        return vec![part.to_string()];
    }

    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_len = 0usize;
    for word in part.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for segment in chars.chunks(limit - 1) {
            if piece_len + segment.len() + 1 >= limit && !piece.is_empty() {
                pieces.push(std::mem::take(&mut piece));
                piece_len = 0;
            }
            if !piece.is_empty() {
                piece.push(' ');
                piece_len += 1;
            }
            piece.extend(segment);
            piece_len += segment.len();
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_known_and_unknown_symbols() {
        assert_eq!(tokenize("hə"), vec![50, 83]);
        assert_eq!(tokenize("ˈa b"), vec![156, 43, 16, 44]);
        // '#' and digits are not in the vocabulary
        assert_eq!(tokenize("a#1"), vec![43]);
    }

    #[test]
    fn test_split_keeps_punctuation_attached() {
        let batches = split_phonemes("həlˈoʊ, wˈɜːld. haʊ ɑːɹ juː?");
        assert_eq!(batches, vec!["həlˈoʊ, wˈɜːld. haʊ ɑːɹ juː?".to_string()]);
    }

    #[test]
    fn test_split_respects_max_length() {
        let clause = "a".repeat(300);
        let text = format!("{clause}. {clause}. {clause}.");
        let batches = split_phonemes(&text);

        assert_eq!(batches.len(), 3);
        for batch in &batches {
            assert!(batch.chars().count() < MAX_PHONEME_LENGTH);
        }
        assert_eq!(batches[0], format!("{clause}."));
    }

    #[test]
    fn test_split_wraps_unpunctuated_text() {
        let text = vec!["abcdefghi"; 200].join(" ");
        let batches = split_phonemes(&text);

        assert!(batches.len() >= 4);
        for batch in &batches {
            assert!(batch.chars().count() < MAX_PHONEME_LENGTH);
        }
        assert_eq!(batches.join(" "), text);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_phonemes("").is_empty());
        assert_eq!(split_phonemes("  , . "), vec![",.".to_string()]);
    }
}
