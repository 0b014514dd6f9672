//! Text normalization shared by the matcher and the cleanser.
//!
//! All functions are pure. [`normalize_title`] and [`normalize_text`] are
//! idempotent: running them on their own output changes nothing.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Upper bound on normalization passes. Each pass can only shrink the string
/// once it stops changing, so two or three passes are typical.
const MAX_PASSES: usize = 8;

/// Feature markers, optionally bracketed on either side: `A (feat. B)`,
/// `A feat.B`, `A featuring(B)`. A bare `feat` needs a word boundary so
/// `A Featherweight` stays whole.
static FEAT_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+[(\[]?(?:(?:featuring|feat)(?:\.|\b)|ft\.)\s*[(\[]?\s*")
        .expect("valid feat regex")
});

/// A standalone `x` between two names: `A x B`, never `Lil Nas X`.
static X_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+x\s+").expect("valid x regex"));

static TIMES_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*×\s*").expect("valid times regex"));

static PUNCT_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[,，/／;；、&＆]\s*").expect("valid punctuation regex"));

static SPACE_INSIDE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*([(\[])\s*").expect("valid bracket regex"));

static SPACE_BEFORE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([)\]])").expect("valid bracket regex"));

/// CJK conjunction splitting `周杰伦和蔡依林`.
const CJK_AND: char = '和';

/// Brackets and punctuation that NFKC leaves alone.
fn map_wide_punctuation(c: char) -> char {
    match c {
        '【' | '〖' => '[',
        '】' | '〗' => ']',
        '〔' | '〘' => '(',
        '〕' | '〙' => ')',
        '「' | '」' | '『' | '』' | '“' | '”' => '"',
        '‘' | '’' => '\'',
        '。' => '.',
        '、' => ',',
        '〜' => '~',
        '\u{3000}' => ' ',
        other => other,
    }
}

/// Cyrillic letters commonly typed in place of their plain look-alikes.
fn fold_cyrillic(c: char) -> char {
    match c {
        'ё' | 'є' => 'е',
        'Ё' | 'Є' => 'Е',
        'і' | 'ї' => 'и',
        'І' | 'Ї' => 'И',
        other => other,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_pass(s: &str, lowercase: bool) -> String {
    let mapped: String = s.nfkc().map(map_wide_punctuation).collect();
    let cased = if lowercase {
        mapped.to_lowercase()
    } else {
        mapped
    };
    let folded: String = cased.chars().map(fold_cyrillic).collect();
    // folding can expose new compositions, e.g. `е` + U+0308
    let recomposed: String = folded.nfkc().collect();
    collapse_whitespace(&recomposed)
}

fn to_fixpoint(s: &str, lowercase: bool) -> String {
    let mut current = normalize_pass(s, lowercase);
    for _ in 0..MAX_PASSES {
        let next = normalize_pass(&current, lowercase);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Case-preserving normalization for lyric text.
///
/// NFKC, fullwidth punctuation to ASCII, Cyrillic folding and whitespace
/// collapse. Used on every line the cleanser keeps.
pub fn normalize_text(s: &str) -> String {
    to_fixpoint(s, false)
}

/// Comparison key for titles and artist names.
///
/// Same as [`normalize_text`] plus case folding. Spacing around brackets is
/// dropped so `Song (Remix)` and `song（remix）` compare equal.
pub fn normalize_title(s: &str) -> String {
    let folded = to_fixpoint(s, true);
    let opened = SPACE_INSIDE_OPEN.replace_all(&folded, "$1");
    SPACE_BEFORE_CLOSE.replace_all(&opened, "$1").into_owned()
}

/// Drop closing brackets left over from `A (feat. B)` style splits.
fn strip_unbalanced_close(token: &str) -> &str {
    let mut token = token.trim();
    loop {
        let open = token.chars().filter(|c| matches!(c, '(' | '[')).count();
        let close = token.chars().filter(|c| matches!(c, ')' | ']')).count();
        if close > open && (token.ends_with(')') || token.ends_with(']')) {
            token = token[..token.len() - 1].trim_end();
        } else {
            return token;
        }
    }
}

fn split_cjk_and(token: &str) -> Vec<String> {
    let pieces: Vec<&str> = token.split(CJK_AND).map(str::trim).collect();
    // `和田光司` is a name, not a pair
    if pieces.len() < 2 || pieces.iter().any(|p| p.is_empty()) {
        vec![token.to_string()]
    } else {
        pieces.into_iter().map(String::from).collect()
    }
}

/// Split a multi-artist credit into individual names.
///
/// Separators are applied in priority order: `feat.`/`featuring`/`ft.`, a
/// standalone `x`, `×`, the punctuation set (`,` `/` `;` `、` `&` and their
/// fullwidth forms), then the CJK conjunction `和`. Tokens are trimmed, empty
/// tokens dropped and duplicates (by [`normalize_title`]) removed, keeping the
/// first occurrence.
///
/// ```ignore
/// assert_eq!(split_artists("A feat. B & C"), vec!["A", "B", "C"]);
/// ```
pub fn split_artists(s: &str) -> Vec<String> {
    let trimmed = s.trim();
    let mut tokens = vec![trimmed.to_string()];

    for separator in [&*FEAT_SEPARATOR, &*X_SEPARATOR, &*TIMES_SEPARATOR, &*PUNCT_SEPARATOR] {
        tokens = tokens
            .iter()
            .flat_map(|token| separator.split(token).map(String::from).collect::<Vec<_>>())
            .collect();
    }
    tokens = tokens.iter().flat_map(|t| split_cjk_and(t)).collect();

    let mut seen = Vec::new();
    let mut result = Vec::new();
    for token in &tokens {
        let token = strip_unbalanced_close(token);
        if token.is_empty() {
            continue;
        }
        let key = normalize_title(token);
        if !seen.contains(&key) {
            seen.push(key);
            result.push(token.to_string());
        }
    }

    if result.is_empty() && !trimmed.is_empty() {
        result.push(trimmed.to_string());
    }
    result
}

/// Share of CJK characters among the letters and digits of `s`.
///
/// Returns `None` when `s` has no letters or digits at all.
pub fn cjk_ratio(s: &str) -> Option<f64> {
    let mut total = 0usize;
    let mut cjk = 0usize;
    for c in s.chars().filter(|c| c.is_alphanumeric()) {
        total += 1;
        if is_cjk(c) {
            cjk += 1;
        }
    }
    (total > 0).then(|| cjk as f64 / total as f64)
}

/// Majority of the letters in `s` are CJK.
pub fn is_cjk_dominant(s: &str) -> bool {
    cjk_ratio(s).is_some_and(|ratio| ratio > 0.5)
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF     // Hiragana, Katakana
        | 0x3400..=0x4DBF   // CJK Extension A
        | 0x4E00..=0x9FFF   // CJK Unified Ideographs
        | 0xAC00..=0xD7AF   // Hangul syllables
        | 0x1100..=0x11FF   // Hangul Jamo
        | 0xF900..=0xFAFF   // CJK Compatibility Ideographs
        | 0x20000..=0x2FA1F // Extensions B..F, compatibility supplement
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title_folds_width_and_case() {
        assert_eq!(normalize_title("Song (Remix)"), normalize_title("song（remix）"));
        assert_eq!(normalize_title("  Ｈｅｌｌｏ   Ｗｏｒｌｄ "), "hello world");
        assert_eq!(normalize_title("【Live】"), "[live]");
        assert_eq!(normalize_title("Song ( Live ) "), "song(live)");
    }

    #[test]
    fn test_normalize_title_folds_cyrillic() {
        assert_eq!(normalize_title("Ёлка"), "елка");
        assert_eq!(normalize_title("Її"), "ии");
        assert_eq!(normalize_title("е\u{308}ж"), "еж");
    }

    #[test]
    fn test_normalize_text_keeps_case() {
        assert_eq!(normalize_text("Hello，World！"), "Hello,World!");
        assert_eq!(normalize_text("你好。再见、朋友"), "你好.再见,朋友");
    }

    #[test]
    fn test_normalize_is_idempotent_on_samples() {
        for s in ["є\u{308}", "İstanbul", "ﬁle　ﬂow", "Ⅻ ㍿", "і\u{306}"] {
            let once = normalize_title(s);
            assert_eq!(normalize_title(&once), once, "input {:?}", s);
            let once = normalize_text(s);
            assert_eq!(normalize_text(&once), once, "input {:?}", s);
        }
    }

    #[test]
    fn test_split_artists_separators() {
        assert_eq!(split_artists("A, B"), vec!["A", "B"]);
        assert_eq!(split_artists("A / B;C"), vec!["A", "B", "C"]);
        assert_eq!(split_artists("周杰伦、蔡依林"), vec!["周杰伦", "蔡依林"]);
        assert_eq!(split_artists("A & B"), vec!["A", "B"]);
        assert_eq!(split_artists("A x B"), vec!["A", "B"]);
        assert_eq!(split_artists("A X B"), vec!["A", "B"]);
        assert_eq!(split_artists("A×B"), vec!["A", "B"]);
        assert_eq!(split_artists("A feat. B"), vec!["A", "B"]);
        assert_eq!(split_artists("A Featuring B"), vec!["A", "B"]);
        assert_eq!(split_artists("A feat.B"), vec!["A", "B"]);
        assert_eq!(split_artists("Alice FEAT.Bob"), vec!["Alice", "Bob"]);
        assert_eq!(split_artists("Alice featuring(Bob)"), vec!["Alice", "Bob"]);
        assert_eq!(split_artists("Alice ft.Bob"), vec!["Alice", "Bob"]);
        assert_eq!(split_artists("周杰伦和蔡依林"), vec!["周杰伦", "蔡依林"]);
        assert_eq!(split_artists("A，B"), vec!["A", "B"]);
    }

    #[test]
    fn test_split_artists_combined_and_bracketed() {
        assert_eq!(split_artists("A (feat. B & C)"), vec!["A", "B", "C"]);
        assert_eq!(split_artists("A ft. B, A"), vec!["A", "B"]);
    }

    #[test]
    fn test_split_artists_respects_word_boundaries() {
        assert_eq!(split_artists("Lil Nas X"), vec!["Lil Nas X"]);
        assert_eq!(split_artists("Xenon"), vec!["Xenon"]);
        assert_eq!(split_artists("Featherweight"), vec!["Featherweight"]);
        assert_eq!(split_artists("A Featherweight"), vec!["A Featherweight"]);
        assert_eq!(split_artists("和田光司"), vec!["和田光司"]);
        assert_eq!(split_artists("  Solo Artist  "), vec!["Solo Artist"]);
    }

    #[test]
    fn test_cjk_dominance() {
        assert!(is_cjk_dominant("你好世界"));
        assert!(is_cjk_dominant("さよなら"));
        assert!(!is_cjk_dominant("Hello world"));
        assert!(!is_cjk_dominant("Hello 你"));
        assert!(!is_cjk_dominant("..."));
        assert_eq!(cjk_ratio("!!"), None);
    }
}
