use crate::embedding::Embedder;
use crate::error::{AppError, Result};

const MODEL_PREFIX: &str = "hashing-ngram-";
const MIN_DIMENSION: usize = 8;
const MAX_DIMENSION: usize = 4096;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic bag-of-ngrams embedder using signed feature hashing
///
/// Word tokens and character trigrams of the lower-cased text are hashed into
/// `dimension` buckets and the result is L2-normalised. Empty text embeds to
/// the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    model_id: String,
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&dimension) {
            return Err(AppError::embedder(
                format!("{}{}", MODEL_PREFIX, dimension),
                format!(
                    "dimension must be between {} and {}",
                    MIN_DIMENSION, MAX_DIMENSION
                ),
            ));
        }
        Ok(Self {
            model_id: format!("{}{}", MODEL_PREFIX, dimension),
            dimension,
        })
    }

    /// Parse a `hashing-ngram-<dim>` id. Returns `Ok(None)` for ids of other families.
    pub fn from_model_id(model_id: &str) -> Result<Option<Self>> {
        let Some(suffix) = model_id.strip_prefix(MODEL_PREFIX) else {
            return Ok(None);
        };
        let dimension = suffix.parse::<usize>().map_err(|_| {
            AppError::embedder(model_id, format!("invalid dimension '{}'", suffix))
        })?;
        Self::new(dimension).map(Some)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.accumulate(&mut vector, word.as_bytes(), WORD_WEIGHT);

            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut vector, trigram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let (bucket, sign) = bucket_and_sign(feature, self.dimension);
        vector[bucket] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>> {
        let batch_size = batch_size.max(1);
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            out.extend(batch.iter().map(|text| self.embed_one(text)));
        }
        Ok(out)
    }
}

// Bucket from the first 8 digest bytes, sign from the top bit of the 9th.
fn bucket_and_sign(feature: &[u8], dimension: usize) -> (usize, f32) {
    let digest = blake3::hash(feature);
    let bytes = digest.as_bytes();

    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[..8]);
    let bucket = (u64::from_le_bytes(head) % dimension as u64) as usize;
    let sign = if bytes[8] & 0x80 != 0 { -1.0 } else { 1.0 };
    (bucket, sign)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_model_id_parsing() {
        let embedder = HashingEmbedder::from_model_id("hashing-ngram-64")
            .unwrap()
            .unwrap();
        assert_eq!(embedder.dimension(), 64);
        assert_eq!(embedder.model_id(), "hashing-ngram-64");

        assert!(HashingEmbedder::from_model_id("other-model").unwrap().is_none());
        assert!(HashingEmbedder::from_model_id("hashing-ngram-abc").is_err());
        assert!(HashingEmbedder::from_model_id("hashing-ngram-2").is_err());
    }

    #[test]
    fn test_embedding_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let input = texts(&["May sunog na amoy", "May sunog na amoy"]);

        let vectors = embedder.embed(&input, 1).unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vectors[1]);
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_embeds_to_zero() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let vectors = embedder.embed(&texts(&["", "   "]), 8).unwrap();

        assert!(vectors.iter().all(|v| v.len() == 16));
        assert!(vectors.iter().flatten().all(|&x| x == 0.0));
    }

    #[test]
    fn test_buckets_follow_blake3_digest() {
        let digest = blake3::hash(b"baha");
        let bytes = digest.as_bytes();
        let expected = (u64::from_le_bytes(bytes[..8].try_into().unwrap()) % 64) as usize;

        let (bucket, sign) = bucket_and_sign(b"baha", 64);
        assert_eq!(bucket, expected);
        assert_eq!(sign < 0.0, bytes[8] >= 0x80);

        let embedder = HashingEmbedder::new(64).unwrap();
        let vectors = embedder.embed(&texts(&["baha", "sunog"]), 8).unwrap();
        assert_ne!(vectors[0], vectors[1]);
    }

    #[test]
    fn test_case_insensitive() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let vectors = embedder
            .embed(&texts(&["BROWNOUT sa Street", "brownout sa street"]), 32)
            .unwrap();

        assert_eq!(vectors[0], vectors[1]);
    }
}
