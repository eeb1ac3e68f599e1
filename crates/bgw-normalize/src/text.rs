// SPDX-License-Identifier: MIT OR Apache-2.0
//! Title and author-name normalization.

/// Leading articles stripped from titles before keying.
const ARTICLES: &[&str] = &["the", "a", "an"];

/// Normalize a title: lowercase, trim, strip a leading article, strip
/// punctuation, collapse whitespace.
///
/// ```
/// use bgw_normalize::normalize_title;
/// assert_eq!(normalize_title("The Great Gatsby!"), "great gatsby");
/// assert_eq!(normalize_title("  A  Wizard of Earthsea "), "wizard of earthsea");
/// ```
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut words: Vec<&str> = lowered.split_whitespace().collect();
    if let Some(first) = words.first() {
        let bare = trim_punct(first);
        if ARTICLES.contains(&bare) {
            words.remove(0);
        }
    }
    collapse(&words)
}

/// Normalize an author name: lowercase, trim, flip a single `"Last, First"`
/// into `"first last"`, strip punctuation, collapse whitespace.
///
/// ```
/// use bgw_normalize::normalize_author;
/// assert_eq!(normalize_author("Le Guin, Ursula K."), "ursula k le guin");
/// assert_eq!(normalize_author("F. Scott Fitzgerald"), "f scott fitzgerald");
/// ```
pub fn normalize_author(name: &str) -> String {
    let lowered = name.to_lowercase();
    let flipped = match lowered.split_once(',') {
        // "last, first" with exactly one comma; multiple commas are left alone.
        Some((last, first)) if !first.contains(',') && !first.trim().is_empty() => {
            format!("{} {}", first.trim(), last.trim())
        }
        _ => lowered,
    };
    let words: Vec<&str> = flipped.split_whitespace().collect();
    collapse(&words)
}

fn trim_punct(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

fn collapse(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_each_article() {
        assert_eq!(normalize_title("The Hobbit"), "hobbit");
        assert_eq!(normalize_title("A Game of Thrones"), "game of thrones");
        assert_eq!(normalize_title("An Instance of the Fingerpost"), "instance of the fingerpost");
    }

    #[test]
    fn only_leading_article_is_stripped() {
        assert_eq!(normalize_title("Journey to the Center"), "journey to the center");
    }

    #[test]
    fn punctuation_and_whitespace_collapse() {
        assert_eq!(normalize_title("  Moby-Dick;  or, The Whale  "), "mobydick or the whale");
        assert_eq!(normalize_title("1984"), "1984");
    }

    #[test]
    fn article_only_title_normalizes_empty() {
        assert_eq!(normalize_title("The"), "");
    }

    #[test]
    fn author_last_first_is_flipped() {
        assert_eq!(normalize_author("Fitzgerald, F. Scott"), "f scott fitzgerald");
        assert_eq!(normalize_author("Tolkien, J.R.R."), "jrr tolkien");
    }

    #[test]
    fn author_without_comma_unchanged_in_order() {
        assert_eq!(normalize_author("Ursula K. Le Guin"), "ursula k le guin");
    }

    #[test]
    fn author_with_trailing_comma_keeps_order() {
        assert_eq!(normalize_author("Morrison,"), "morrison");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_title("The Left Hand of Darkness");
        assert_eq!(normalize_title(&once), once);
        let once = normalize_author("Le Guin, Ursula K.");
        assert_eq!(normalize_author(&once), once);
    }
}
