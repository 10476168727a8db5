//! Splitting long replies to fit Telegram's message size limit.

/// Maximum characters in one Telegram text message.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Splits `text` into chunks of at most `limit` characters.
///
/// Cuts at the last newline inside each window when there is one, otherwise
/// mid-line. The newline a chunk is cut at is dropped.
#[must_use]
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map_or(rest.len(), |(i, _)| i);
        let window = &rest[..window_end];

        match window.rfind('\n') {
            Some(cut) if cut > 0 => {
                chunks.push(window[..cut].to_string());
                rest = &rest[cut + 1..];
            }
            _ => {
                chunks.push(window.to_string());
                rest = &rest[window_end..];
            }
        }
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", MAX_MESSAGE_CHARS), vec!["hello"]);
        assert_eq!(split_message("", MAX_MESSAGE_CHARS), vec![""]);
    }

    #[test]
    fn exact_limit_is_not_split() {
        let text = "a".repeat(MAX_MESSAGE_CHARS);
        assert_eq!(split_message(&text, MAX_MESSAGE_CHARS).len(), 1);
    }

    #[test]
    fn splits_on_line_boundaries() {
        let text = "one\ntwo\nthree\nfour";
        assert_eq!(split_message(text, 9), vec!["one\ntwo", "three", "four"]);
    }

    #[test]
    fn long_line_is_cut_hard() {
        let chunks = split_message("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn every_chunk_respects_the_limit() {
        let line = "é".repeat(100);
        let text = vec![line; 100].join("\n");

        let chunks = split_message(&text, MAX_MESSAGE_CHARS);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_MESSAGE_CHARS));

        let rejoined = chunks.join("\n");
        assert_eq!(rejoined, text);
    }
}
