//! Natural ordering for artifact filenames.
//!
//! Filenames are split into alternating runs of ASCII digits and everything
//! else. Digit runs compare as integers, so `2_song.mp3` sorts before
//! `10_song.mp3`; text runs compare case-insensitively. Every directory
//! listing in the pipeline goes through this ordering instead of creation
//! time or plain lexicographic order.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

/// Split a string into alternating digit / non-digit runs.
fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;

    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != is_digit => {
                out.push(make_chunk(&s[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }

    if let Some(prev) = in_digits {
        out.push(make_chunk(&s[start..], prev));
    }
    out
}

fn make_chunk(run: &str, digits: bool) -> Chunk<'_> {
    if digits {
        Chunk::Digits(run)
    } else {
        Chunk::Text(run)
    }
}

/// Compare two digit runs by integer value without parsing, so arbitrarily
/// long runs never overflow.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    a_lower.cmp(&b_lower)
}

/// Natural comparison of two strings.
///
/// Ties between strings that differ only in case or leading zeros fall back
/// to byte order so the ordering is total and deterministic.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l, r) {
            (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => cmp_text(x, y),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}

/// Sort strings in natural order.
pub fn sort_naturally<S: AsRef<str>>(items: &mut [S]) {
    items.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

fn file_name_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Sort paths in natural order of their file names.
pub fn sort_paths_naturally(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| {
        natural_cmp(&file_name_key(a), &file_name_key(b)).then_with(|| a.cmp(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_runs_compare_as_integers() {
        let mut names = vec!["2_a.mp3", "10_a.mp3", "1_b.mp3"];
        sort_naturally(&mut names);
        assert_eq!(names, vec!["1_b.mp3", "2_a.mp3", "10_a.mp3"]);
    }

    #[test]
    fn test_song_prefix_ordering() {
        assert_eq!(natural_cmp("2_song", "10_song"), Ordering::Less);
        assert_eq!(natural_cmp("10_song", "2_song"), Ordering::Greater);
        assert_eq!(natural_cmp("song 9", "song 10"), Ordering::Less);
    }

    #[test]
    fn test_text_runs_ignore_case() {
        assert_eq!(natural_cmp("1_Alpha", "1_beta"), Ordering::Less);
        assert_eq!(natural_cmp("1_ALPHA", "1_alpha"), Ordering::Less);
    }

    #[test]
    fn test_leading_zeros_and_long_runs() {
        assert_eq!(natural_cmp("007_x", "7_x"), Ordering::Less);
        assert_eq!(natural_cmp("8_x", "007_x"), Ordering::Greater);
        assert_eq!(
            natural_cmp("99999999999999999999999_a", "100000000000000000000000_a"),
            Ordering::Less
        );
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert_eq!(natural_cmp("1_song", "1_song_2"), Ordering::Less);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
    }

    #[test]
    fn test_takes_follow_their_song() {
        let mut names = vec![
            "2_Night Drive.mp3",
            "1_Intro_2.mp3",
            "10_Finale.mp3",
            "1_Intro.mp3",
        ];
        sort_naturally(&mut names);
        assert_eq!(
            names,
            vec!["1_Intro.mp3", "1_Intro_2.mp3", "2_Night Drive.mp3", "10_Finale.mp3"]
        );
    }

    #[test]
    fn test_sort_paths_uses_file_name() {
        let mut paths = vec![
            PathBuf::from("/b/songs/10_a.mp3"),
            PathBuf::from("/a/songs/9_a.mp3"),
        ];
        sort_paths_naturally(&mut paths);
        assert_eq!(paths[0], PathBuf::from("/a/songs/9_a.mp3"));
    }
}
