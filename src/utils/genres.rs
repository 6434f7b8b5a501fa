//! Mapping of free-text subjects/categories onto a controlled genre list.

use std::collections::BTreeSet;

/// Substring key -> canonical genre.
///
/// Matching is plain containment on the lower-cased label, so one label can
/// hit several keys ("nonfiction" also contains "fiction").
pub const GENRE_MAP: &[(&str, &str)] = &[
    ("fiction", "Fiction"),
    ("nonfiction", "Non-Fiction"),
    ("fantasy", "Fantasy"),
    ("science fiction", "Sci-Fi"),
    ("sci-fi", "Sci-Fi"),
    ("ya", "Young Adult"),
    ("young adult", "Young Adult"),
    ("romance", "Romance"),
    ("mystery", "Mystery"),
    ("thriller", "Thriller"),
    ("horror", "Horror"),
    ("historical", "Historical"),
    ("history", "History"),
    ("biography", "Biography"),
    ("memoir", "Memoir"),
    ("self-help", "Self-Help"),
    ("business", "Business"),
    ("philosophy", "Philosophy"),
    ("poetry", "Poetry"),
    ("children", "Children"),
    ("graphic novels", "Comics/Graphic"),
    ("comics", "Comics/Graphic"),
    ("technology", "Technology"),
    ("computer", "Technology"),
    ("programming", "Technology"),
    ("science", "Science"),
    ("math", "Math"),
    ("religion", "Religion"),
    ("art", "Art"),
    ("travel", "Travel"),
];

/// Normalize labels to a sorted, de-duplicated list of canonical genres.
///
/// A label that already names a canonical genre maps to exactly that genre,
/// so normalizing a normalized list is a no-op. `None` entries are skipped.
pub fn normalize_genres<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut out: BTreeSet<&'static str> = BTreeSet::new();

    for label in labels.into_iter().flatten() {
        let label = label.as_ref().trim().to_lowercase();
        if label.is_empty() {
            continue;
        }
        if let Some(genre) = canonical(&label) {
            out.insert(genre);
            continue;
        }
        for (key, genre) in GENRE_MAP {
            if label.contains(*key) {
                out.insert(*genre);
            }
        }
    }

    out.into_iter().map(str::to_string).collect()
}

fn canonical(label: &str) -> Option<&'static str> {
    GENRE_MAP
        .iter()
        .map(|(_, genre)| *genre)
        .find(|genre| genre.eq_ignore_ascii_case(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(labels: &[&str]) -> Vec<String> {
        normalize_genres(labels.iter().map(Some))
    }

    #[test]
    fn test_basic_mapping() {
        assert_eq!(norm(&["Fantasy fiction"]), vec!["Fantasy", "Fiction"]);
        assert_eq!(norm(&["  MYSTERY  "]), vec!["Mystery"]);
    }

    #[test]
    fn test_one_label_multiple_genres() {
        let genres = norm(&["Science Fiction"]);
        assert_eq!(genres, vec!["Fiction", "Sci-Fi", "Science"]);
    }

    #[test]
    fn test_output_sorted_and_unique() {
        let genres = norm(&["Horror", "horror stories", "Comics", "Graphic Novels"]);
        assert_eq!(genres, vec!["Comics/Graphic", "Horror"]);
    }

    #[test]
    fn test_none_and_unmatched_labels_skipped() {
        let genres = normalize_genres(vec![None, Some("Cooking"), Some("Travel guides")]);
        assert_eq!(genres, vec!["Travel"]);
        assert!(normalize_genres(Vec::<Option<&str>>::new()).is_empty());
    }

    #[test]
    fn test_canonical_genres_map_to_themselves() {
        let canonical: BTreeSet<&str> = GENRE_MAP.iter().map(|(_, genre)| *genre).collect();
        for genre in canonical.iter().copied() {
            assert_eq!(norm(&[genre]), vec![genre], "changed {}", genre);
        }

        let all: Vec<&str> = canonical.into_iter().collect();
        assert_eq!(norm(&all), all);
    }

    #[test]
    fn test_non_fiction_round_trip() {
        assert_eq!(norm(&["Non-Fiction"]), vec!["Non-Fiction"]);
        assert_eq!(norm(&["non-fiction"]), vec!["Non-Fiction"]);
        // The free-text spelling still hits both substring keys
        assert_eq!(norm(&["Nonfiction"]), vec!["Fiction", "Non-Fiction"]);
    }
}
