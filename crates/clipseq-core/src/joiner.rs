//! Joins several text items into one pasteable string.
//!
//! Three modes exist: `cjk` (default) decides per junction whether a space is
//! needed based on the scripts meeting there, `english` joins on spaces and
//! tidies the space around `, . ! ?`, and `custom` uses a literal separator.

use crate::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([,.!?])").expect("valid punctuation regex"));
static MISSING_SPACE_AFTER_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([,.!?])(\w)").expect("valid punctuation regex"));
static SPACE_BEFORE_CJK_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([，。！？；：、])").expect("valid punctuation regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    #[default]
    Cjk,
    English,
    Custom,
}

impl JoinMode {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinMode::Cjk => "cjk",
            JoinMode::English => "english",
            JoinMode::Custom => "custom",
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cjk" => Ok(JoinMode::Cjk),
            "english" => Ok(JoinMode::English),
            "custom" => Ok(JoinMode::Custom),
            _ => Err(ParseError::JoinMode(s.to_string())),
        }
    }
}

/// CJK Unified Ideographs, Hiragana/Katakana and Hangul syllables.
pub fn is_cjk(ch: char) -> bool {
    matches!(ch, '\u{4E00}'..='\u{9FFF}' | '\u{3040}'..='\u{30FF}' | '\u{AC00}'..='\u{D7AF}')
}

/// Join fragments in order. `None` fragments are skipped; the rest are trimmed
/// before use. `custom_sep` only matters for [`JoinMode::Custom`].
pub fn join<I, S>(fragments: I, mode: JoinMode, custom_sep: &str) -> String
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let owned: Vec<S> = fragments.into_iter().flatten().collect();
    let parts: Vec<&str> = owned.iter().map(|p| p.as_ref().trim()).collect();
    match mode {
        JoinMode::Custom => parts.join(custom_sep),
        JoinMode::English => join_english(&parts),
        JoinMode::Cjk => join_cjk(&parts),
    }
}

/// [`join`] for fragments that are all present.
pub fn join_texts<S: AsRef<str>>(parts: &[S], mode: JoinMode, custom_sep: &str) -> String {
    join(parts.iter().map(Some), mode, custom_sep)
}

fn join_english(parts: &[&str]) -> String {
    let joined = parts.join(" ");
    let tightened = SPACE_BEFORE_PUNCT.replace_all(&joined, "${1}");
    MISSING_SPACE_AFTER_PUNCT
        .replace_all(&tightened, "${1} ${2}")
        .into_owned()
}

fn join_cjk(parts: &[&str]) -> String {
    let mut out = String::new();
    let mut prev_last: Option<char> = None;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            // An empty neighbour still gets a space.
            let fuse = matches!(
                (prev_last, part.chars().next()),
                (Some(a), Some(b)) if is_cjk(a) && is_cjk(b)
            );
            if !fuse {
                out.push(' ');
            }
        }
        out.push_str(part);
        prev_last = part.chars().last();
    }
    SPACE_BEFORE_CJK_PUNCT
        .replace_all(&out, "${1}")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_joins_to_empty_string() {
        let none: [&str; 0] = [];
        assert_eq!(join_texts(&none, JoinMode::Cjk, ""), "");
        assert_eq!(join_texts(&none, JoinMode::English, ""), "");
        assert_eq!(join_texts(&none, JoinMode::Custom, "-"), "");
    }

    #[test]
    fn cjk_pairs_fuse_without_space() {
        assert_eq!(join_texts(&["你好", "世界"], JoinMode::Cjk, ""), "你好世界");
        assert_eq!(join_texts(&["こんにちは", "カタカナ"], JoinMode::Cjk, ""), "こんにちはカタカナ");
        assert_eq!(join_texts(&["안녕", "하세요"], JoinMode::Cjk, ""), "안녕하세요");
    }

    #[test]
    fn script_boundaries_get_a_space() {
        assert_eq!(join_texts(&["Hello", "world"], JoinMode::Cjk, ""), "Hello world");
        assert_eq!(join_texts(&["你好", "world"], JoinMode::Cjk, ""), "你好 world");
        assert_eq!(join_texts(&["world", "你好"], JoinMode::Cjk, ""), "world 你好");
    }

    #[test]
    fn cjk_mode_trims_fragments_and_drops_space_before_fullwidth_punct() {
        assert_eq!(join_texts(&["  你好 ", " world "], JoinMode::Cjk, ""), "你好 world");
        assert_eq!(join_texts(&["hello", "。结束"], JoinMode::Cjk, ""), "hello。结束");
        assert_eq!(join_texts(&["ok", "，然后"], JoinMode::Cjk, ""), "ok，然后");
    }

    #[test]
    fn empty_fragment_in_cjk_mode_still_inserts_space() {
        assert_eq!(join_texts(&["你好", "", "世界"], JoinMode::Cjk, ""), "你好  世界");
        assert_eq!(join_texts(&["", "a"], JoinMode::Cjk, ""), " a");
    }

    #[test]
    fn absent_fragments_are_skipped() {
        let frags = vec![Some("你好"), None, Some("世界")];
        assert_eq!(join(frags, JoinMode::Cjk, ""), "你好世界");
        let all_absent: Vec<Option<&str>> = vec![None, None];
        assert_eq!(join(all_absent, JoinMode::English, ""), "");
    }

    #[test]
    fn custom_uses_literal_separator() {
        assert_eq!(join_texts(&["a", "b", "c"], JoinMode::Custom, "-"), "a-b-c");
        assert_eq!(join_texts(&[" a ", "b"], JoinMode::Custom, " | "), "a | b");
        assert_eq!(join_texts(&["x", "y"], JoinMode::Custom, ""), "xy");
    }

    #[test]
    fn english_tightens_punctuation() {
        assert_eq!(join_texts(&["Hi ,", "there."], JoinMode::English, ""), "Hi, there.");
        assert_eq!(join_texts(&["one", ", two"], JoinMode::English, ""), "one, two");
        assert_eq!(join_texts(&["end.", "Next"], JoinMode::English, ""), "end. Next");
        assert_eq!(join_texts(&["a,b!c"], JoinMode::English, ""), "a, b! c");
        assert_eq!(join_texts(&["Really", "?"], JoinMode::English, ""), "Really?");
    }

    #[test]
    fn join_is_deterministic() {
        let parts = ["你好", "world", "。", "x"];
        let first = join_texts(&parts, JoinMode::Cjk, "");
        let second = join_texts(&parts, JoinMode::Cjk, "");
        assert_eq!(first, second);
    }

    #[test]
    fn classification_ranges() {
        assert!(is_cjk('\u{4E00}'));
        assert!(is_cjk('\u{9FFF}'));
        assert!(is_cjk('\u{3040}'));
        assert!(is_cjk('\u{30FF}'));
        assert!(is_cjk('\u{AC00}'));
        assert!(is_cjk('\u{D7AF}'));
        assert!(!is_cjk('\u{3000}'));
        assert!(!is_cjk('，'));
        assert!(!is_cjk('a'));
    }

    #[test]
    fn mode_names_parse_and_reject_unknowns() {
        assert_eq!("CJK".parse::<JoinMode>().unwrap(), JoinMode::Cjk);
        assert_eq!("english".parse::<JoinMode>().unwrap(), JoinMode::English);
        assert_eq!("custom".parse::<JoinMode>().unwrap(), JoinMode::Custom);
        assert_eq!(
            "klingon".parse::<JoinMode>(),
            Err(ParseError::JoinMode("klingon".into()))
        );
    }
}
