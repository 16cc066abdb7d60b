//! Match-and-merge highlighting.
//!
//! Every literal occurrence of every term is collected, the pool is ordered by
//! `(start asc, end desc, encounter order asc)`, and a single greedy pass keeps
//! each match that starts at or after the end of the previously kept one. The
//! survivors are stitched together with the untouched text between them so the
//! resulting spans always partition the input exactly.
//!
//! Offsets are byte offsets into the source `&str` and always sit on char
//! boundaries because they come from [`str::find`].

use crate::terms::TermRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A literal occurrence of a term inside the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a> {
    pub start: usize,
    pub end: usize,
    /// Position in the pooled enumeration; resolves ties on equal ranges.
    pub order: usize,
    pub record: &'a TermRecord,
}

impl Match<'_> {
    pub fn term(&self) -> &str {
        &self.record.term
    }

    pub fn definition(&self) -> &str {
        &self.record.definition
    }

    pub fn category(&self) -> &str {
        &self.record.category
    }
}

/// A slice of the source text, either untouched or annotated with a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Span {
    Literal {
        start: usize,
        end: usize,
        text: String,
    },
    Annotated {
        start: usize,
        end: usize,
        text: String,
        definition: String,
        category: String,
    },
}

impl Span {
    fn literal(source: &str, start: usize, end: usize) -> Self {
        Span::Literal {
            start,
            end,
            text: source[start..end].to_string(),
        }
    }

    fn annotated(source: &str, found: &Match<'_>) -> Self {
        Span::Annotated {
            start: found.start,
            end: found.end,
            text: source[found.start..found.end].to_string(),
            definition: found.definition().to_string(),
            category: found.category().to_string(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Span::Literal { text, .. } | Span::Annotated { text, .. } => text,
        }
    }

    pub fn start(&self) -> usize {
        match self {
            Span::Literal { start, .. } | Span::Annotated { start, .. } => *start,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            Span::Literal { end, .. } | Span::Annotated { end, .. } => *end,
        }
    }

    pub fn is_annotated(&self) -> bool {
        matches!(self, Span::Annotated { .. })
    }
}

/// Highlights `text` with `terms`, returning spans that cover the whole input.
pub fn highlight(text: &str, terms: &[TermRecord]) -> Vec<Span> {
    let pooled = pool_matches(text, terms);
    let accepted = select_matches(pooled);
    build_spans(text, &accepted)
}

/// Non-overlapping occurrences of `record.term`, scanning left to right.
///
/// The cursor jumps to the end of each hit, so `"ABA"` in `"ABABA"` is found
/// once at 0 and once more only if a full copy starts at or after offset 3.
/// `order_base` seeds the [`Match::order`] of the first hit.
pub fn find_all_matches<'a>(
    text: &str,
    record: &'a TermRecord,
    order_base: usize,
) -> Vec<Match<'a>> {
    let needle = record.term.as_str();
    let mut matches = Vec::new();
    if needle.is_empty() {
        return matches;
    }
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find(needle) {
        let start = cursor + offset;
        let end = start + needle.len();
        matches.push(Match {
            start,
            end,
            order: order_base + matches.len(),
            record,
        });
        cursor = end;
    }
    matches
}

/// Enumerates matches for every record, in record order.
pub fn pool_matches<'a>(text: &str, terms: &'a [TermRecord]) -> Vec<Match<'a>> {
    let mut pooled = Vec::new();
    for record in terms {
        let found = find_all_matches(text, record, pooled.len());
        pooled.extend(found);
    }
    pooled
}

/// Greedy interval scheduling over the pooled matches.
///
/// Longer matches win over shorter ones that start at the same offset, and
/// identical ranges are decided by encounter order. Losers are dropped.
pub fn select_matches(mut pooled: Vec<Match<'_>>) -> Vec<Match<'_>> {
    pooled.sort_unstable_by(compare_matches);
    let mut accepted = Vec::with_capacity(pooled.len());
    let mut last_end = 0;
    for candidate in pooled {
        if candidate.start >= last_end {
            last_end = candidate.end;
            accepted.push(candidate);
        }
    }
    accepted
}

fn compare_matches(a: &Match<'_>, b: &Match<'_>) -> Ordering {
    a.start
        .cmp(&b.start)
        .then_with(|| b.end.cmp(&a.end))
        .then_with(|| a.order.cmp(&b.order))
}

/// Emits literal and annotated spans for sorted, non-overlapping matches.
pub fn build_spans(text: &str, accepted: &[Match<'_>]) -> Vec<Span> {
    if accepted.is_empty() {
        return vec![Span::literal(text, 0, text.len())];
    }
    let mut spans = Vec::with_capacity(accepted.len() * 2 + 1);
    let mut cursor = 0;
    for found in accepted {
        if cursor < found.start {
            spans.push(Span::literal(text, cursor, found.start));
        }
        spans.push(Span::annotated(text, found));
        cursor = found.end;
    }
    if cursor < text.len() {
        spans.push(Span::literal(text, cursor, text.len()));
    }
    spans
}

/// Number of annotated spans.
pub fn annotated_count(spans: &[Span]) -> usize {
    spans.iter().filter(|span| span.is_annotated()).count()
}
