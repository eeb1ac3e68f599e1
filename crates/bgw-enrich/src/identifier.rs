// SPDX-License-Identifier: MIT OR Apache-2.0
//! What a caller can enrich by.

use bgw_normalize::canonical_isbn13;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The lookup key for one enrichment: an ISBN when the caller has one,
/// otherwise a title with an optional author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BookIdentifier {
    Isbn {
        isbn: String,
    },
    TitleAuthor {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
    },
}

impl BookIdentifier {
    /// Identifier from a raw row: prefer a valid ISBN, fall back to
    /// title/author. Returns `None` when neither is usable.
    pub fn from_row(title: Option<&str>, author: Option<&str>, isbn: Option<&str>) -> Option<Self> {
        if let Some(isbn13) = isbn.and_then(canonical_isbn13) {
            return Some(Self::Isbn { isbn: isbn13 });
        }
        let title = title?.trim();
        if title.is_empty() {
            return None;
        }
        Some(Self::TitleAuthor {
            title: title.to_string(),
            author: author
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from),
        })
    }
}

impl fmt::Display for BookIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isbn { isbn } => write!(f, "isbn:{isbn}"),
            Self::TitleAuthor {
                title,
                author: Some(author),
            } => write!(f, "{title} by {author}"),
            Self::TitleAuthor { title, author: None } => f.write_str(title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isbn_wins_over_title() {
        let id = BookIdentifier::from_row(Some("1984"), None, Some("0451524934")).unwrap();
        assert_eq!(
            id,
            BookIdentifier::Isbn {
                isbn: "9780451524935".into()
            }
        );
    }

    #[test]
    fn invalid_isbn_falls_back_to_title() {
        let id = BookIdentifier::from_row(Some("1984"), Some("Orwell"), Some("not-isbn")).unwrap();
        assert_eq!(
            id,
            BookIdentifier::TitleAuthor {
                title: "1984".into(),
                author: Some("Orwell".into())
            }
        );
    }

    #[test]
    fn blank_rows_are_unusable() {
        assert!(BookIdentifier::from_row(Some("  "), None, None).is_none());
        assert!(BookIdentifier::from_row(None, Some("Orwell"), None).is_none());
    }
}
