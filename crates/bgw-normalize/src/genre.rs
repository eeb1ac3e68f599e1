// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded genre vocabulary.
//!
//! Provider category strings are wildly inconsistent ("Fiction / Science
//! Fiction / General", "Sci-Fi", "juvenile fiction"). Known variants map
//! into a small canonical set; unknown tags pass through lowercased so the
//! vocabulary stays bounded without dropping information.

/// Alias → canonical tag pairs. Keys are compared lowercased and trimmed.
const GENRE_ALIASES: &[(&str, &str)] = &[
    ("sci-fi", "science fiction"),
    ("scifi", "science fiction"),
    ("sf", "science fiction"),
    ("science-fiction", "science fiction"),
    ("fiction / science fiction", "science fiction"),
    ("fiction / science fiction / general", "science fiction"),
    ("speculative fiction", "science fiction"),
    ("fantasy fiction", "fantasy"),
    ("fiction / fantasy", "fantasy"),
    ("fiction / fantasy / general", "fantasy"),
    ("epic fantasy", "fantasy"),
    ("detective and mystery stories", "mystery"),
    ("fiction / mystery & detective", "mystery"),
    ("mystery & detective", "mystery"),
    ("crime fiction", "crime"),
    ("thrillers", "thriller"),
    ("fiction / thrillers", "thriller"),
    ("suspense", "thriller"),
    ("horror fiction", "horror"),
    ("fiction / horror", "horror"),
    ("love stories", "romance"),
    ("fiction / romance", "romance"),
    ("historical fiction", "historical fiction"),
    ("fiction / historical", "historical fiction"),
    ("juvenile fiction", "children"),
    ("children's fiction", "children"),
    ("children's books", "children"),
    ("young adult fiction", "young adult"),
    ("ya", "young adult"),
    ("biography & autobiography", "biography"),
    ("autobiography", "biography"),
    ("memoir", "biography"),
    ("literary fiction", "literary"),
    ("fiction / literary", "literary"),
    ("graphic novels", "comics"),
    ("comics & graphic novels", "comics"),
    ("poetry", "poetry"),
    ("self-help", "self help"),
    ("business & economics", "business"),
    ("history / general", "history"),
    ("true crime", "true crime"),
    ("cooking", "cooking"),
    ("cookery", "cooking"),
];

/// Map a provider subject/category into the canonical vocabulary.
///
/// Known aliases map to their canonical tag; unknown tags come back
/// lowercased and trimmed. Empty input yields `None`.
pub fn normalize_subject(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    for (alias, canonical) in GENRE_ALIASES {
        if lowered == *alias {
            return Some((*canonical).to_string());
        }
    }
    Some(lowered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_aliases_canonicalize() {
        assert_eq!(normalize_subject("Sci-Fi").as_deref(), Some("science fiction"));
        assert_eq!(
            normalize_subject("Fiction / Science Fiction / General").as_deref(),
            Some("science fiction")
        );
        assert_eq!(normalize_subject("Juvenile Fiction").as_deref(), Some("children"));
        assert_eq!(
            normalize_subject("Biography & Autobiography").as_deref(),
            Some("biography")
        );
    }

    #[test]
    fn unknown_tags_pass_through_lowercased() {
        assert_eq!(normalize_subject("Nautical Archaeology").as_deref(), Some("nautical archaeology"));
    }

    #[test]
    fn empty_and_blank_yield_none() {
        assert_eq!(normalize_subject(""), None);
        assert_eq!(normalize_subject("   "), None);
    }

    #[test]
    fn output_is_stable_under_reapplication() {
        let once = normalize_subject("Thrillers").unwrap();
        assert_eq!(normalize_subject(&once).unwrap(), once);
    }
}
