//! Per-frame LZW decompression for the upstream strike feed.
//!
//! Every inbound frame is self-contained: the dictionary starts with the
//! 256 single-byte literals and grows as decoding proceeds, then is thrown
//! away at the end of the frame. Symbols are Unicode code points, not UTF-8
//! bytes: a dictionary reference above 255 arrives as one multi-byte
//! character, and splitting it into bytes would corrupt the index.

use std::collections::HashMap;

use thiserror::Error;

/// Codes below this are literal characters, not dictionary references.
const BASE_ALPHABET: u32 = 256;

/// All errors produced while decompressing a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty frame")]
    EmptyFrame,
    #[error("undefined dictionary code {0}")]
    UnknownCode(u32),
}

/// Decompress one frame into its original text.
///
/// The expected output is a JSON-encoded strike event, but the codec makes
/// no assumption about the payload.
pub fn decode(frame: &str) -> Result<String, DecodeError> {
    let mut symbols = frame.chars();
    let first = symbols.next().ok_or(DecodeError::EmptyFrame)?;

    let mut out = String::with_capacity(frame.len() * 2);
    out.push(first);

    let mut dict: HashMap<u32, String> = HashMap::new();
    let mut next_code = BASE_ALPHABET;
    let mut prev_phrase = first.to_string();
    let mut prev_first = first;

    for symbol in symbols {
        let code = symbol as u32;
        let phrase = if code < BASE_ALPHABET {
            symbol.to_string()
        } else if let Some(entry) = dict.get(&code) {
            entry.clone()
        } else if code == next_code {
            // Standard LZW just-in-time entry: the encoder referenced the
            // phrase it is about to define.
            let mut entry = prev_phrase.clone();
            entry.push(prev_first);
            entry
        } else {
            return Err(DecodeError::UnknownCode(code));
        };

        out.push_str(&phrase);

        let first_char = phrase.chars().next().expect("phrase is never empty");
        let mut entry = prev_phrase;
        entry.push(first_char);
        dict.insert(next_code, entry);
        next_code += 1;

        prev_phrase = phrase;
        prev_first = first_char;
    }

    Ok(out)
}

/// Compress text with the same per-frame dictionary convention.
///
/// Used by tests and the CLI to produce frames the feed would send.
/// Returns `None` if the input contains characters outside the 8-bit
/// alphabet, or if the dictionary grows into a code point range that
/// cannot be carried in a text frame (the surrogate block).
pub fn encode(text: &str) -> Option<String> {
    let mut dict: HashMap<String, u32> = HashMap::new();
    let mut next_code = BASE_ALPHABET;
    let mut out = String::with_capacity(text.len());
    let mut pending = String::new();

    for ch in text.chars() {
        if ch as u32 >= BASE_ALPHABET {
            return None;
        }
        let mut extended = pending.clone();
        extended.push(ch);
        if pending.is_empty() || dict.contains_key(&extended) {
            pending = extended;
        } else {
            out.push(phrase_symbol(&pending, &dict)?);
            dict.insert(extended, next_code);
            next_code += 1;
            pending.clear();
            pending.push(ch);
        }
    }

    if !pending.is_empty() {
        out.push(phrase_symbol(&pending, &dict)?);
    }
    Some(out)
}

/// Map a phrase to its output symbol: single characters stand for
/// themselves, longer phrases must already be in the dictionary.
fn phrase_symbol(phrase: &str, dict: &HashMap<String, u32>) -> Option<char> {
    let mut chars = phrase.chars();
    let first = chars.next()?;
    let code = if chars.next().is_none() {
        first as u32
    } else {
        *dict.get(phrase)?
    };
    char::from_u32(code)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_frame() {
        assert_eq!(decode(""), Err(DecodeError::EmptyFrame));
    }

    #[test]
    fn test_decode_literals_only() {
        // No character repeats, so every symbol is a literal.
        assert_eq!(decode("abc").unwrap(), "abc");
    }

    #[test]
    fn test_decode_dictionary_reference() {
        // "AB" + code 256 ("AB") + code 258 (just-in-time "ABA")
        let frame: String = ['A', 'B', '\u{100}', '\u{102}'].iter().collect();
        assert_eq!(decode(&frame).unwrap(), "ABABABA");
    }

    #[test]
    fn test_decode_unknown_code() {
        // Code 300 when only 256 would be defined next.
        let frame: String = ['A', 'B', '\u{12C}'].iter().collect();
        assert_eq!(decode(&frame), Err(DecodeError::UnknownCode(300)));
    }

    #[test]
    fn test_round_trip_strike_event() {
        let text = r#"{"time":1700000000000000000,"lat":51.5,"lon":-0.12}"#;
        let frame = encode(text).unwrap();
        assert!(frame.chars().count() < text.chars().count());
        assert_eq!(decode(&frame).unwrap(), text);
    }

    #[test]
    fn test_round_trip_repetitive_text() {
        let text = "the quick brown fox ".repeat(40);
        let frame = encode(&text).unwrap();
        assert_eq!(decode(&frame).unwrap(), text);
    }

    #[test]
    fn test_dictionary_resets_between_frames() {
        // Frame B decodes identically whether or not frame A was decoded
        // first; the dictionary never survives a frame boundary.
        let a = encode(&"abcabcabc".repeat(10)).unwrap();
        let b = encode(r#"{"lat":1.0,"lon":2.0}"#).unwrap();

        let b_alone = decode(&b).unwrap();
        let _ = decode(&a).unwrap();
        let b_after_a = decode(&b).unwrap();
        assert_eq!(b_alone, b_after_a);
    }

    #[test]
    fn test_encode_rejects_wide_characters() {
        assert!(encode("caf\u{2603}").is_none());
    }

    #[test]
    fn test_encode_empty_is_empty() {
        assert_eq!(encode("").unwrap(), "");
    }
}
