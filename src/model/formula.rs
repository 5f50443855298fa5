//! Chemical formula notations used for configuration rows.
//!
//! All three notations take per-element atom counts. Counts of one are never
//! written out.

use std::collections::BTreeMap;

use super::types::Element;

/// Counts atoms per element.
pub fn element_counts(elements: impl IntoIterator<Item = Element>) -> BTreeMap<Element, usize> {
    let mut counts = BTreeMap::new();
    for el in elements {
        *counts.entry(el).or_insert(0) += 1;
    }
    counts
}

/// Hill notation: C first, H second, the rest alphabetical. Without carbon
/// every symbol is alphabetical, hydrogen included.
pub fn hill(counts: &BTreeMap<Element, usize>) -> String {
    let mut symbols: Vec<(&str, usize)> = counts
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(el, n)| (el.symbol(), *n))
        .collect();
    symbols.sort_by(|a, b| a.0.cmp(b.0));

    let mut ordered = Vec::with_capacity(symbols.len());
    if counts.get(&Element::C).is_some_and(|n| *n > 0) {
        for head in ["C", "H"] {
            if let Some(pos) = symbols.iter().position(|(s, _)| *s == head) {
                ordered.push(symbols.remove(pos));
            }
        }
    }
    ordered.extend(symbols);

    render(ordered.into_iter())
}

/// Alphabetical symbols with counts divided by their greatest common divisor.
pub fn reduced(counts: &BTreeMap<Element, usize>) -> String {
    let divisor = gcd_all(counts.values().copied());
    let mut symbols: Vec<(&str, usize)> = counts
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(el, n)| (el.symbol(), *n / divisor))
        .collect();
    symbols.sort_by(|a, b| a.0.cmp(b.0));
    render(symbols.into_iter())
}

/// Element identity replaced by placeholder labels, largest count first.
pub fn anonymous(counts: &BTreeMap<Element, usize>) -> String {
    let divisor = gcd_all(counts.values().copied());
    let mut reduced: Vec<usize> = counts
        .values()
        .filter(|n| **n > 0)
        .map(|n| n / divisor)
        .collect();
    reduced.sort_unstable_by(|a, b| b.cmp(a));

    let labels: Vec<String> = (0..reduced.len()).map(anonymous_label).collect();
    render(labels.iter().map(String::as_str).zip(reduced))
}

/// `A..Z`, then `Aa..Za`, `Ab..Zb`, and so on.
fn anonymous_label(idx: usize) -> String {
    let mut label = String::new();
    label.push(char::from(b'A' + (idx % 26) as u8));
    let round = idx / 26;
    if round > 0 {
        label.push(char::from(b'a' + ((round - 1) % 26) as u8));
    }
    label
}

fn render<'a>(parts: impl Iterator<Item = (&'a str, usize)>) -> String {
    let mut out = String::new();
    for (symbol, n) in parts {
        out.push_str(symbol);
        if n > 1 {
            out.push_str(&n.to_string());
        }
    }
    out
}

fn gcd_all(values: impl Iterator<Item = usize>) -> usize {
    values.fold(0, gcd).max(1)
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}
