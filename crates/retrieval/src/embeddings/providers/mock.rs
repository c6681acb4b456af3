//! Deterministic offline embedder.
//!
//! Feature hashing over lowercase words and their padded character trigrams:
//! texts that share vocabulary end up close, which is enough for tests and
//! demos without a model runtime.

use crate::embeddings::normalize;
use crate::embeddings::provider::EmbeddingProvider;
use incidex_core::AppResult;

pub const MOCK_MODEL: &str = "trigram-v1";

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "was", "were", "are", "with", "from", "that", "this", "has", "had",
    "have", "been", "its", "into", "out", "off", "any", "all", "not", "but", "at", "on", "in",
    "of", "to", "by", "an", "is", "as", "or",
];

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug)]
pub struct MockProvider {
    dimensions: usize,
}

impl MockProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Blank text embeds to the zero vector.
    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        for word in words(text) {
            self.add(&mut vector, fnv1a(word.as_bytes()), WORD_WEIGHT);

            let padded: Vec<char> = format!("<{}>", word).chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.add(&mut vector, fnv1a(gram.as_bytes()), TRIGRAM_WEIGHT);
            }
        }

        normalize(&mut vector);
        vector
    }

    /// Signed feature hashing: the low bits pick the bucket, the top bit the
    /// sign.
    fn add(&self, vector: &mut [f32], hash: u64, weight: f32) {
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325_u64, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_words_lowercase_and_filter() {
        let words: Vec<String> = words("Flood at Kottara, the ROAD-side; 1").collect();
        assert_eq!(words, vec!["flood", "kottara", "road", "side"]);
    }

    #[tokio::test]
    async fn test_identity() {
        let provider = MockProvider::new(384);
        assert_eq!(provider.dimensions(), 384);
        assert_eq!(provider.provider_name(), "mock");
        assert_eq!(provider.model_name(), "trigram-v1");
    }

    #[tokio::test]
    async fn test_embeddings_are_unit_length() {
        let provider = MockProvider::new(384);
        let texts = vec![
            "Flood near Kottara Chowki".to_string(),
            "Tree fall blocking the road".to_string(),
        ];

        let embeddings = provider.embed_many(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), 384);
            assert!((norm(embedding) - 1.0).abs() < 1e-3);
        }
    }

    #[tokio::test]
    async fn test_deterministic_and_case_insensitive() {
        let provider = MockProvider::new(384);
        let first = provider.embed_one("landslide at Pachanady").await.unwrap();
        let second = provider.embed_one("landslide at Pachanady").await.unwrap();
        assert_eq!(first, second);

        let plain = provider.embed_one("flood").await.unwrap();
        let labelled = provider.embed_one("Flood.").await.unwrap();
        assert_eq!(plain, labelled);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let provider = MockProvider::new(384);
        let query = provider.embed_one("flood").await.unwrap();
        let flood = provider
            .embed_one("Type: Flood\nRemarks: flood water entered homes")
            .await
            .unwrap();
        let tree = provider
            .embed_one("Type: Tree Fall\nRemarks: branch removed")
            .await
            .unwrap();

        assert!(dot(&query, &flood) > dot(&query, &tree));
    }

    #[tokio::test]
    async fn test_blank_text_is_zero_vector() {
        let provider = MockProvider::new(384);
        let embedding = provider.embed_one("").await.unwrap();
        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|&x| x == 0.0));
    }
}
