//! Extractive summarization by sentence centrality (TextRank).
//!
//! Sentences are nodes, word overlap is the edge weight, and a damped power
//! iteration ranks them. The top sentences are returned in their original
//! order, joined by single spaces, and cut to a character budget.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").unwrap());
static CHUNK_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n|\.\s+").unwrap());

const DAMPING: f64 = 0.85;
const EPSILON: f64 = 1e-4;
const MAX_ITERATIONS: usize = 100;

/// Chunks shorter than this (in characters) are skipped by [`summarize_long`].
pub const MIN_CHUNK_CHARS: usize = 50;

/// Appended when a summary is cut to its budget.
pub const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummarizeError {
    #[error("input is empty")]
    Empty,
    #[error("input contains no words")]
    NoWords,
    #[error("no chunk of at least {MIN_CHUNK_CHARS} characters")]
    NoChunks,
}

/// Pick the `sentence_count` most central sentences of `text`.
pub fn summarize(
    text: &str,
    sentence_count: usize,
    max_length: usize,
) -> Result<String, SummarizeError> {
    if text.trim().is_empty() {
        return Err(SummarizeError::Empty);
    }
    let sentences = split_sentences(text);
    let words: Vec<HashSet<String>> = sentences.iter().map(|s| word_set(s)).collect();
    if words.iter().all(HashSet::is_empty) {
        return Err(SummarizeError::NoWords);
    }

    let scores = rank(&words);
    let mut order: Vec<usize> = (0..sentences.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    order.truncate(sentence_count.max(1));
    order.sort_unstable();

    let joined = order
        .iter()
        .map(|&i| sentences[i])
        .collect::<Vec<_>>()
        .join(" ");
    Ok(truncate_with_ellipsis(joined.trim(), max_length))
}

/// Summarize heterogeneous text one chunk at a time.
///
/// Splits on newlines and sentence ends, skips chunks shorter than
/// [`MIN_CHUNK_CHARS`], summarizes up to `max_chunks` survivors to one
/// sentence each and joins the results with single spaces.
pub fn summarize_long(
    text: &str,
    max_chunks: usize,
    max_length: usize,
) -> Result<String, SummarizeError> {
    let summaries: Vec<String> = CHUNK_BOUNDARY
        .split(text)
        .map(str::trim)
        .filter(|chunk| chunk.chars().count() >= MIN_CHUNK_CHARS)
        .take(max_chunks)
        .map(|chunk| summarize(chunk, 1, max_length).unwrap_or_else(|_| chunk.to_string()))
        .collect();

    if summaries.is_empty() {
        return Err(SummarizeError::NoChunks);
    }
    Ok(summaries.join(" "))
}

/// Cut `text` to `max_length` characters, appending [`ELLIPSIS`] when cut.
pub fn truncate_with_ellipsis(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_length).collect();
    cut.truncate(cut.trim_end().len());
    cut.push_str(ELLIPSIS);
    cut
}

/// Split on line breaks and on `.`, `!` or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    for line in text.lines() {
        let mut start = 0;
        let mut chars = line.char_indices().peekable();
        while let Some((idx, ch)) = chars.next() {
            if !matches!(ch, '.' | '!' | '?') {
                continue;
            }
            let at_boundary = chars.peek().is_none_or(|&(_, next)| next.is_whitespace());
            if at_boundary {
                let end = idx + ch.len_utf8();
                push_trimmed(&mut sentences, &line[start..end]);
                start = end;
            }
        }
        push_trimmed(&mut sentences, &line[start..]);
    }
    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

fn word_set(sentence: &str) -> HashSet<String> {
    WORD.find_iter(sentence)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let common = a.intersection(b).count();
    if common == 0 {
        return 0.0;
    }
    let norm = (a.len() as f64).ln() + (b.len() as f64).ln();
    if norm.abs() < f64::EPSILON {
        common as f64
    } else {
        common as f64 / norm
    }
}

/// Damped PageRank over the row-normalized similarity matrix.
fn rank(words: &[HashSet<String>]) -> Vec<f64> {
    let n = words.len();
    let mut weights = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let w = similarity(&words[i], &words[j]);
            weights[i][j] = w;
            weights[j][i] = w;
        }
    }
    for row in weights.iter_mut() {
        let sum: f64 = row.iter().sum();
        if sum > 0.0 {
            row.iter_mut().for_each(|w| *w /= sum);
        }
    }

    let base = (1.0 - DAMPING) / n as f64;
    let mut scores = vec![1.0 / n as f64; n];
    for _ in 0..MAX_ITERATIONS {
        let next: Vec<f64> = (0..n)
            .map(|j| base + DAMPING * (0..n).map(|i| weights[i][j] * scores[i]).sum::<f64>())
            .collect();
        let delta: f64 = next.iter().zip(&scores).map(|(a, b)| (a - b).abs()).sum();
        scores = next;
        if delta < EPSILON {
            break;
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = "Amazon S3 now supports conditional writes for objects. \
        Conditional writes let applications check that an object does not exist before writing it. \
        The weather was pleasant. \
        Applications can use conditional writes to prevent overwriting existing objects in S3.";

    #[test]
    fn test_single_sentence_is_unchanged() {
        let s = "Azure Container Apps now supports dedicated GPU workload profiles.";
        assert_eq!(summarize(s, 2, 300).unwrap(), s);
    }

    #[test]
    fn test_selects_central_sentences_in_original_order() {
        let summary = summarize(ARTICLE, 2, 1000).unwrap();
        assert!(!summary.contains("weather"));
        let first = summary.find("Conditional writes let").unwrap_or(usize::MAX);
        let second = summary.find("Applications can use").unwrap_or(usize::MAX);
        let lead = summary.find("Amazon S3 now").unwrap_or(usize::MAX);
        // Positions listed in document order must also be ascending in the summary.
        let in_doc_order: Vec<usize> = [lead, first, second]
            .into_iter()
            .filter(|&p| p != usize::MAX)
            .collect();
        assert_eq!(in_doc_order.len(), 2);
        let mut ascending = in_doc_order.clone();
        ascending.sort_unstable();
        assert_eq!(in_doc_order, ascending);
    }

    #[test]
    fn test_sentence_budget() {
        let summary = summarize(ARTICLE, 1, 1000).unwrap();
        assert_eq!(split_sentences(&summary).len(), 1);
    }

    #[test]
    fn test_truncates_to_max_length() {
        let summary = summarize(ARTICLE, 3, 40).unwrap();
        assert!(summary.ends_with(ELLIPSIS));
        assert!(summary.chars().count() <= 40 + ELLIPSIS.len());
    }

    #[test]
    fn test_truncation_counts_characters() {
        let korean = "가나다라마바사아자차카타파하";
        let cut = truncate_with_ellipsis(korean, 5);
        assert_eq!(cut, "가나다라마...");
        assert_eq!(truncate_with_ellipsis("short", 5), "short");
    }

    #[test]
    fn test_empty_and_garbage_input_fail() {
        assert_eq!(summarize("", 1, 150), Err(SummarizeError::Empty));
        assert_eq!(summarize("   \n ", 1, 150), Err(SummarizeError::Empty));
        assert_eq!(summarize("!!! ... ???", 1, 150), Err(SummarizeError::NoWords));
    }

    #[test]
    fn test_split_sentences() {
        let parts = split_sentences("One. Two! Three? v1.5 ships...  Four\nFive");
        assert_eq!(parts, vec!["One.", "Two!", "Three?", "v1.5 ships...", "Four", "Five"]);
    }

    #[test]
    fn test_summarize_long_skips_short_chunks() {
        let text = "Short intro.\n\
            Cloud Run jobs can now run for up to twenty four hours per task attempt. \
            Too short. \
            Cloud Run services support mounting Cloud Storage buckets as volumes today.\n\
            A third sufficiently long chunk that would be summarized if budget allowed it.";
        let summary = summarize_long(text, 2, 150).unwrap();
        assert!(summary.starts_with("Cloud Run jobs can now run"));
        assert!(summary.contains("Cloud Storage buckets as volumes"));
        assert!(!summary.contains("third"));
        assert!(!summary.contains("Short intro"));
    }

    #[test]
    fn test_summarize_long_without_long_chunks() {
        assert_eq!(
            summarize_long("Tiny. Bits. Only.", 3, 150),
            Err(SummarizeError::NoChunks)
        );
    }

    #[test]
    fn test_summarize_long_caps_each_chunk() {
        let chunk = "word ".repeat(60);
        let summary = summarize_long(&chunk, 3, 20).unwrap();
        assert!(summary.ends_with(ELLIPSIS));
        assert!(summary.chars().count() <= 20 + ELLIPSIS.len());
    }
}
