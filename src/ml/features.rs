use crate::embedding::Embedder;
use crate::error::{AppError, Result};
use ndarray::Array2;
use std::sync::Arc;

/// A named set of substrings whose presence sets one binary feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordGroup {
    pub name: &'static str,
    pub terms: &'static [&'static str],
}

/// Keyword groups, in feature order. Training and prediction both read this table.
pub const KEYWORD_GROUPS: [KeywordGroup; 8] = [
    KeywordGroup {
        name: "water",
        terms: &["tubig", "nawalan ng tubig"],
    },
    KeywordGroup {
        name: "electricity",
        terms: &["brownout", "kuryente", "ilaw"],
    },
    KeywordGroup {
        name: "garbage",
        terms: &["basura", "garbage", "kanal"],
    },
    KeywordGroup {
        name: "noise",
        terms: &["ingay", "karaoke", "malakas"],
    },
    KeywordGroup {
        name: "crime",
        terms: &["nakawan", "ninakaw", "lasing"],
    },
    KeywordGroup {
        name: "fire",
        terms: &["sunog", "apoy"],
    },
    KeywordGroup {
        name: "flood",
        terms: &["baha", "flooding"],
    },
    KeywordGroup {
        name: "road",
        terms: &["butas", "kalsada", "street"],
    },
];

/// text_length + word_count + one flag per keyword group
pub const N_HANDCRAFTED_FEATURES: usize = 2 + KEYWORD_GROUPS.len();

/// Hand-crafted scalar features of one text
#[derive(Debug, Clone, PartialEq)]
pub struct HandcraftedFeatures {
    /// Character count
    pub text_length: usize,

    /// Whitespace-delimited token count
    pub word_count: usize,

    /// One flag per entry of [`KEYWORD_GROUPS`]
    pub keyword_flags: [bool; KEYWORD_GROUPS.len()],
}

impl HandcraftedFeatures {
    pub fn extract(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let mut keyword_flags = [false; KEYWORD_GROUPS.len()];
        for (flag, group) in keyword_flags.iter_mut().zip(KEYWORD_GROUPS.iter()) {
            *flag = group.terms.iter().any(|term| lowered.contains(term));
        }

        Self {
            text_length: text.chars().count(),
            word_count: text.split_whitespace().count(),
            keyword_flags,
        }
    }

    /// Flag for a group by name
    pub fn has(&self, group: &str) -> bool {
        KEYWORD_GROUPS
            .iter()
            .position(|g| g.name == group)
            .map(|idx| self.keyword_flags[idx])
            .unwrap_or(false)
    }

    /// `[text_length, word_count, flags...]`
    pub fn to_vec(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(N_HANDCRAFTED_FEATURES);
        values.push(self.text_length as f64);
        values.push(self.word_count as f64);
        values.extend(
            self.keyword_flags
                .iter()
                .map(|&flag| if flag { 1.0 } else { 0.0 }),
        );
        values
    }
}

/// Builds complaint feature vectors: `[embedding] ++ [text_length, word_count] ++ [keyword flags]`
#[derive(Clone)]
pub struct FeatureBuilder {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl FeatureBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Total feature dimension
    pub fn dimension(&self) -> usize {
        self.embedder.dimension() + N_HANDCRAFTED_FEATURES
    }

    pub fn embedder_model(&self) -> &str {
        self.embedder.model_id()
    }

    /// Feature vector of a single text
    pub fn build(&self, text: &str) -> Result<Vec<f64>> {
        let matrix = self.build_batch(&[text.to_string()])?;
        Ok(matrix.row(0).to_vec())
    }

    /// Feature matrix (one row per text) using one batched embedder pass
    pub fn build_batch(&self, texts: &[String]) -> Result<Array2<f64>> {
        let embeddings = self.embedder.embed(texts, self.batch_size)?;
        if embeddings.len() != texts.len() {
            return Err(AppError::embedder(
                self.embedder.model_id(),
                format!(
                    "returned {} vectors for {} texts",
                    embeddings.len(),
                    texts.len()
                ),
            ));
        }

        let emb_dim = self.embedder.dimension();
        let n_features = self.dimension();
        let mut features = Array2::zeros((texts.len(), n_features));

        for (i, (text, embedding)) in texts.iter().zip(embeddings.iter()).enumerate() {
            if embedding.len() != emb_dim {
                return Err(AppError::DimensionMismatch {
                    expected: emb_dim,
                    actual: embedding.len(),
                });
            }
            for (j, &value) in embedding.iter().enumerate() {
                features[[i, j]] = f64::from(value);
            }
            for (j, value) in HandcraftedFeatures::extract(text).to_vec().into_iter().enumerate() {
                features[[i, emb_dim + j]] = value;
            }
        }

        tracing::debug!(rows = texts.len(), n_features, "Built feature matrix");
        Ok(features)
    }

    /// Column names in feature order
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (0..self.embedder.dimension())
            .map(|i| format!("emb_{}", i))
            .collect();
        names.push("text_length".to_string());
        names.push("word_count".to_string());
        names.extend(KEYWORD_GROUPS.iter().map(|g| format!("has_{}", g.name)));
        names
    }
}

impl std::fmt::Debug for FeatureBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureBuilder")
            .field("embedder", &self.embedder.model_id())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
