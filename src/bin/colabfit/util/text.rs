/// Greedy word wrap. Words longer than `width` (long paths, ids) are split
/// across lines rather than overflowing the box they are printed in.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        for piece in split_long(word, width) {
            let len = piece.chars().count();
            if current_len == 0 {
                current.push_str(&piece);
                current_len = len;
            } else if current_len + 1 + len <= width {
                current.push(' ');
                current.push_str(&piece);
                current_len += 1 + len;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(&piece);
                current_len = len;
            }
        }
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }

    lines
}

fn split_long(word: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(width)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Shortens `s` to at most `max_len` characters, marking the cut with `…`.
pub fn truncate(s: &str, max_len: usize) -> String {
    match max_len {
        0 => String::new(),
        _ if s.chars().count() <= max_len => s.to_string(),
        1 => "…".to_string(),
        _ => {
            let mut out: String = s.chars().take(max_len - 1).collect();
            out.push('…');
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_fits_on_one_line() {
        assert_eq!(wrap("property not found", 40), vec!["property not found"]);
    }

    #[test]
    fn wrap_breaks_between_words() {
        assert_eq!(
            wrap("missing field for energy", 12),
            vec!["missing", "field for", "energy"]
        );
    }

    #[test]
    fn wrap_splits_overlong_words() {
        assert_eq!(
            wrap("see /data/abcdefghij.xyz now", 10),
            vec!["see", "/data/abcd", "efghij.xyz", "now"]
        );
    }

    #[test]
    fn wrap_empty_gives_one_blank_line() {
        assert_eq!(wrap("   ", 10), vec![String::new()]);
    }

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("H2O", 10), "H2O");
        assert_eq!(truncate("atoms", 5), "atoms");
    }

    #[test]
    fn truncate_marks_the_cut() {
        assert_eq!(truncate("configuration_sets", 8), "configu…");
        assert_eq!(truncate("ab", 1), "…");
        assert_eq!(truncate("ab", 0), "");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("Å·Å·Å·Å", 4), "Å·Å…");
    }
}
