//! Embedding input and output

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Text to embed: a single string or an ordered batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    /// Single text, yields a single vector
    Single(String),
    /// Batch of texts, yields one vector per text in the same order
    Batch(Vec<String>),
}

impl EmbeddingInput {
    /// Texts to embed, in input order
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        match self {
            Self::Single(text) => vec![text.as_str()],
            Self::Batch(texts) => texts.iter().map(String::as_str).collect(),
        }
    }

    /// Number of texts
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(texts) => texts.len(),
        }
    }

    /// Whether the input holds no text at all (an empty batch)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for EmbeddingInput {
    fn from(text: &str) -> Self {
        Self::Single(text.to_string())
    }
}

impl From<String> for EmbeddingInput {
    fn from(text: String) -> Self {
        Self::Single(text)
    }
}

impl From<Vec<String>> for EmbeddingInput {
    fn from(texts: Vec<String>) -> Self {
        Self::Batch(texts)
    }
}

/// Embedding result, mirroring the cardinality of the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Embedding {
    /// Vector for a single input string
    Single(Vec<f32>),
    /// Vectors for a batch input, in input order
    Batch(Vec<Vec<f32>>),
}

impl Embedding {
    /// Shape `vectors` (ordered as the input texts) like `input`
    ///
    /// Fails when the number of vectors does not match the number of texts.
    pub fn for_input(input: &EmbeddingInput, mut vectors: Vec<Vec<f32>>) -> Result<Self, DomainError> {
        if vectors.len() != input.len() {
            return Err(DomainError::ValidationError(format!(
                "expected {} embedding vectors, got {}",
                input.len(),
                vectors.len()
            )));
        }
        match input {
            EmbeddingInput::Single(_) => vectors
                .pop()
                .map(Self::Single)
                .ok_or_else(|| DomainError::ValidationError("missing embedding vector".to_string())),
            EmbeddingInput::Batch(_) => Ok(Self::Batch(vectors)),
        }
    }

    /// All vectors, in order
    #[must_use]
    pub fn vectors(&self) -> Vec<&[f32]> {
        match self {
            Self::Single(v) => vec![v.as_slice()],
            Self::Batch(vs) => vs.iter().map(Vec::as_slice).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_input_yields_single_vector() {
        let input = EmbeddingInput::from("hello");
        let out = Embedding::for_input(&input, vec![vec![0.1, 0.2]]).unwrap();
        assert_eq!(out, Embedding::Single(vec![0.1, 0.2]));
    }

    #[test]
    fn batch_input_keeps_order() {
        let input = EmbeddingInput::from(vec!["a".to_string(), "b".to_string()]);
        let out = Embedding::for_input(&input, vec![vec![1.0], vec![2.0]]).unwrap();
        assert_eq!(out, Embedding::Batch(vec![vec![1.0], vec![2.0]]));
    }

    #[test]
    fn one_element_batch_stays_a_batch() {
        let input = EmbeddingInput::Batch(vec!["a".to_string()]);
        let out = Embedding::for_input(&input, vec![vec![1.0]]).unwrap();
        assert!(matches!(out, Embedding::Batch(ref v) if v.len() == 1));
    }

    #[test]
    fn cardinality_mismatch_is_rejected() {
        let input = EmbeddingInput::Batch(vec!["a".to_string(), "b".to_string()]);
        assert!(Embedding::for_input(&input, vec![vec![1.0]]).is_err());
    }

    #[test]
    fn input_deserializes_untagged() {
        let single: EmbeddingInput = serde_json::from_str(r#""x""#).unwrap();
        let batch: EmbeddingInput = serde_json::from_str(r#"["x","y"]"#).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(batch.texts(), vec!["x", "y"]);
    }
}
