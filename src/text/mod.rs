//! Text helpers shared by the validator, the metrics calculator, and the
//! engine's post-processing step.

use once_cell::sync::Lazy;
use regex::Regex;

static HORIZONTAL_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\S)[ \t]+").unwrap());
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());
static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9'_-]*").unwrap());

/// Collapse redundant whitespace while keeping line structure.
///
/// Trailing spaces are removed from every line, runs of spaces or tabs inside a
/// line become a single space, and more than one blank line in a row
/// becomes exactly one. Leading indentation is preserved.
pub fn collapse_whitespace(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| HORIZONTAL_RUN.replace_all(line.trim_end(), "${1} ").into_owned())
        .collect();
    let joined = lines.join("\n");
    EXCESS_NEWLINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// Truncate `text` to at most `max_chars` characters, cutting at a word
/// boundary and appending `marker`.
///
/// The marker counts towards the limit. Text that already fits is
/// returned unchanged.
pub fn truncate_at_word_boundary(text: &str, max_chars: usize, marker: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let marker_len = marker.chars().count();
    if max_chars <= marker_len {
        return marker.chars().take(max_chars).collect();
    }

    let budget = max_chars - marker_len;
    let cut: String = text.chars().take(budget).collect();
    let next_is_space = text.chars().nth(budget).map_or(true, char::is_whitespace);

    let kept = if next_is_space {
        cut.as_str()
    } else {
        match cut.rfind(char::is_whitespace) {
            Some(idx) if idx > 0 => &cut[..idx],
            _ => cut.as_str(),
        }
    };

    format!("{}{}", kept.trim_end(), marker)
}

/// Split text into non-empty sentences.
pub fn split_sentences(text: &str) -> Vec<&str> {
    SENTENCE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lowercased words of `text`.
pub fn words(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Number of words in `text`.
pub fn word_count(text: &str) -> usize {
    WORD.find_iter(text).count()
}

/// Number of paragraphs (blocks separated by blank lines).
pub fn paragraph_count(text: &str) -> usize {
    PARAGRAPH_BREAK
        .split(text)
        .filter(|p| !p.trim().is_empty())
        .count()
}

/// Case-insensitive whole-word matcher for any of `terms`.
///
/// Terms may contain several words. Longer terms are tried first so a
/// phrase wins over a word it starts with.
pub fn term_pattern(terms: &[&str]) -> Result<Regex, regex::Error> {
    let mut sorted: Vec<&str> = terms.to_vec();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()));
    let alternation = sorted
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
}

/// Rough token estimate (four characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    if chars == 0 {
        0
    } else {
        (chars + 3) / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace_keeps_paragraphs() {
        let input = "Hello    world  \n\n\n\nNext   line\t\t here\n";
        assert_eq!(collapse_whitespace(input), "Hello world\n\nNext line here");
    }

    #[test]
    fn test_collapse_whitespace_keeps_indentation() {
        let input = "Steps:\n  1. first\n  2. second";
        assert_eq!(collapse_whitespace(input), input);
    }

    #[test]
    fn test_truncate_fits_unchanged() {
        assert_eq!(truncate_at_word_boundary("short text", 50, "..."), "short text");
    }

    #[test]
    fn test_truncate_cuts_at_word_boundary() {
        let out = truncate_at_word_boundary("The quick brown fox jumps", 15, "...");
        assert_eq!(out, "The quick...");
        assert!(out.chars().count() <= 15);
    }

    #[test]
    fn test_truncate_exact_boundary() {
        // budget lands right before a space
        let out = truncate_at_word_boundary("alpha beta gamma", 13, "...");
        assert_eq!(out, "alpha beta...");
    }

    #[test]
    fn test_truncate_single_long_word() {
        let out = truncate_at_word_boundary("abcdefghijklmnop", 8, "...");
        assert_eq!(out, "abcde...");
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        let out = truncate_at_word_boundary("héllo wörld ünïcode", 12, "...");
        assert!(out.ends_with("..."));
        assert!(out.chars().count() <= 12);
    }

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("First one. Second one! Third?");
        assert_eq!(s, vec!["First one", "Second one", "Third"]);
    }

    #[test]
    fn test_word_helpers() {
        assert_eq!(word_count("Debug this code"), 3);
        assert_eq!(words("It's GOOD"), vec!["it's", "good"]);
        assert_eq!(paragraph_count("a\n\nb\n  \nc"), 3);
    }

    #[test]
    fn test_term_pattern_whole_words() {
        let ensure = term_pattern(&["ensure"]).unwrap();
        assert_eq!(ensure.find_iter("Ensure it ensures. ENSURE!").count(), 2);

        let transitions = term_pattern(&["in", "in conclusion", "then"]).unwrap();
        assert_eq!(transitions.find_iter("in conclusion, then In Conclusion").count(), 3);
        assert_eq!(transitions.find_iter("next").count(), 0);
    }

    #[test]
    fn test_term_pattern_escapes_terms() {
        let re = term_pattern(&["c++", "a.b"]).unwrap();
        assert_eq!(re.find_iter("axb").count(), 0);
        assert_eq!(re.find_iter("a.b and a.b").count(), 2);
    }

    #[test]
    fn test_collapse_whitespace_normalizes_single_tabs() {
        assert_eq!(collapse_whitespace("a\tb"), "a b");
        assert_eq!(collapse_whitespace("a \t b\t\tc"), "a b c");
        assert_eq!(collapse_whitespace("x\n\tindented\tline"), "x\n\tindented line");
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
