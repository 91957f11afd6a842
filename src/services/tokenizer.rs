//! Deterministic BPE tokenization with a hard length cap.

use tiktoken_rs::{CoreBPE, cl100k_base};

use crate::error::TokenizerError;

/// Tokenizer shared across a whole corpus run.
///
/// Uses the `cl100k_base` encoding, so the same text always produces the same
/// token ids. Sequences longer than `max_tokens` are silently truncated; that
/// is a cost and latency control, not an error.
pub struct Tokenizer {
    bpe: CoreBPE,
    max_tokens: usize,
}

/// A tokenized corpus plus the aggregate token count used for the advisory
/// cost estimate.
#[derive(Debug, Clone)]
pub struct TokenizedCorpus {
    pub sequences: Vec<Vec<u32>>,
    pub total_tokens: usize,
}

impl TokenizedCorpus {
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

impl Tokenizer {
    pub fn new(max_tokens: usize) -> Result<Self, TokenizerError> {
        let bpe = cl100k_base().map_err(|e| TokenizerError::Init(e.to_string()))?;
        Ok(Self {
            bpe,
            max_tokens: max_tokens.max(1),
        })
    }

    /// Encode one text, dropping trailing tokens beyond the cap.
    pub fn encode_truncated(&self, text: &str) -> Vec<u32> {
        let mut ids = self.bpe.encode_with_special_tokens(text);
        ids.truncate(self.max_tokens);
        ids
    }

    /// Encode every text in input order, accumulating the token total.
    pub fn tokenize_corpus(&self, texts: &[String]) -> TokenizedCorpus {
        let sequences: Vec<Vec<u32>> = texts.iter().map(|t| self.encode_truncated(t)).collect();
        let total_tokens = sequences.iter().map(Vec::len).sum();
        TokenizedCorpus {
            sequences,
            total_tokens,
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let tokenizer = Tokenizer::new(100).unwrap();
        let a = tokenizer.encode_truncated("April is a month.");
        let b = tokenizer.encode_truncated("April is a month.");
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_truncation_caps_length() {
        let short = Tokenizer::new(5).unwrap();
        let long = Tokenizer::new(10_000).unwrap();

        let text = "one two three four five six seven eight nine ten".repeat(4);
        let truncated = short.encode_truncated(&text);
        let full = long.encode_truncated(&text);

        assert_eq!(truncated.len(), 5);
        assert!(full.len() > 5);
        assert_eq!(truncated[..], full[..5]);
    }

    #[test]
    fn test_no_truncation_below_cap() {
        let tokenizer = Tokenizer::new(10_000).unwrap();
        let wide = Tokenizer::new(20_000).unwrap();

        let tokens = tokenizer.encode_truncated("short text");
        assert_eq!(tokens, wide.encode_truncated("short text"));
    }

    #[test]
    fn test_corpus_total() {
        let tokenizer = Tokenizer::new(100).unwrap();
        let texts = vec!["April is a month.".to_string(), "August too.".to_string()];
        let corpus = tokenizer.tokenize_corpus(&texts);

        assert_eq!(corpus.len(), 2);
        let expected: usize = corpus.sequences.iter().map(Vec::len).sum();
        assert_eq!(corpus.total_tokens, expected);
    }

    #[test]
    fn test_empty_corpus() {
        let tokenizer = Tokenizer::new(100).unwrap();
        let corpus = tokenizer.tokenize_corpus(&[]);
        assert!(corpus.is_empty());
        assert_eq!(corpus.total_tokens, 0);
    }
}
