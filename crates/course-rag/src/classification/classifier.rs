//! Passage classification by nearest category description

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::ClassificationConfig;
use crate::error::{Error, Result};
use crate::providers::{embed_all, EmbeddingProvider};
use crate::storage::cosine_similarity;
use crate::types::Passage;

use super::taxonomy::{CategoryId, Taxonomy};

/// Passage texts grouped by category, one bucket per taxonomy entry
#[derive(Debug, Clone)]
pub struct CategoryBuckets {
    taxonomy: Arc<Taxonomy>,
    buckets: Vec<Vec<String>>,
}

impl CategoryBuckets {
    /// Empty buckets for every category
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        let buckets = vec![Vec::new(); taxonomy.len()];
        Self { taxonomy, buckets }
    }

    /// Buckets filled by category name
    pub fn from_named(taxonomy: Arc<Taxonomy>, entries: &[(&str, &[&str])]) -> Result<Self> {
        let mut buckets = Self::new(taxonomy);
        for (name, texts) in entries {
            let id = buckets.taxonomy.require(name)?;
            for text in texts.iter() {
                buckets.push(id, text.to_string());
            }
        }
        Ok(buckets)
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn push(&mut self, id: CategoryId, text: String) {
        if let Some(bucket) = self.buckets.get_mut(id.0) {
            bucket.push(text);
        }
    }

    pub fn get(&self, id: CategoryId) -> &[String] {
        self.buckets.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(id, name, texts)` in declaration order, empty buckets included
    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, &str, &[String])> {
        self.buckets
            .iter()
            .enumerate()
            .map(|(i, texts)| (CategoryId(i), self.taxonomy.name(CategoryId(i)), texts.as_slice()))
    }

    /// Passage count per category name, zeros included
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.iter()
            .map(|(_, name, texts)| (name.to_string(), texts.len()))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Output of one classification pass
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub buckets: CategoryBuckets,
    /// Passages dropped as long case studies
    pub excluded: usize,
}

/// Closest centroid by cosine similarity; the first declared wins ties
pub fn nearest_category(embedding: &[f32], centroids: &[Vec<f32>]) -> Option<(CategoryId, f32)> {
    let mut best: Option<(CategoryId, f32)> = None;
    for (i, centroid) in centroids.iter().enumerate() {
        let score = cosine_similarity(embedding, centroid);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((CategoryId(i), score)),
        }
    }
    best
}

/// Assigns passages to taxonomy categories
///
/// Category description embeddings are computed on first use and shared by
/// every run that holds this classifier.
pub struct CategoryClassifier {
    taxonomy: Arc<Taxonomy>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: ClassificationConfig,
    parallelism: usize,
    centroids: OnceCell<Vec<Vec<f32>>>,
}

impl CategoryClassifier {
    pub fn new(
        taxonomy: Arc<Taxonomy>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: ClassificationConfig,
        parallelism: usize,
    ) -> Self {
        Self {
            taxonomy,
            embedder,
            config,
            parallelism: parallelism.max(1),
            centroids: OnceCell::new(),
        }
    }

    pub fn taxonomy(&self) -> &Arc<Taxonomy> {
        &self.taxonomy
    }

    async fn centroids(&self) -> Result<&[Vec<f32>]> {
        let centroids = self
            .centroids
            .get_or_try_init(|| async {
                let descriptions: Vec<String> = self
                    .taxonomy
                    .categories
                    .iter()
                    .map(|c| c.description.clone())
                    .collect();

                tracing::info!(
                    "Embedding {} category descriptions with {}",
                    descriptions.len(),
                    self.embedder.name()
                );

                embed_all(
                    self.embedder.as_ref(),
                    &descriptions,
                    self.parallelism,
                    "category description",
                )
                .await
            })
            .await?;

        Ok(centroids.as_slice())
    }

    /// Compute category embeddings now instead of on the first run
    pub async fn warm_up(&self) -> Result<()> {
        self.centroids().await.map(|_| ())
    }

    /// Long passages mentioning the case-study phrase are left out
    pub fn is_case_study(&self, text: &str) -> bool {
        let phrase = self.config.case_study_phrase.to_lowercase();
        !phrase.is_empty()
            && text.chars().count() > self.config.case_study_min_chars
            && text.to_lowercase().contains(&phrase)
    }

    /// Embed and assign every passage, in input order
    pub async fn assign(&self, passages: Vec<Passage>) -> Result<Vec<Passage>> {
        let centroids = self.centroids().await?;
        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embeddings =
            embed_all(self.embedder.as_ref(), &texts, self.parallelism, "passage").await?;

        passages
            .into_iter()
            .zip(embeddings)
            .map(|(passage, embedding)| {
                let (category, score) = nearest_category(&embedding, centroids)
                    .ok_or_else(|| Error::internal("taxonomy has no categories"))?;
                tracing::debug!(
                    "Passage ({} chars) -> {} ({:.3})",
                    passage.char_len(),
                    self.taxonomy.name(category),
                    score
                );
                Ok(passage.categorized(category, embedding))
            })
            .collect()
    }

    /// Filter case studies, then bucket the remaining passages by category
    pub async fn classify(&self, passages: Vec<Passage>) -> Result<ClassificationResult> {
        let total = passages.len();
        let kept: Vec<Passage> = passages
            .into_iter()
            .filter(|p| !self.is_case_study(&p.text))
            .collect();
        let excluded = total - kept.len();

        if excluded > 0 {
            tracing::info!("Excluded {} case-study passages", excluded);
        }

        let mut buckets = CategoryBuckets::new(Arc::clone(&self.taxonomy));
        for passage in self.assign(kept).await? {
            if let Some(category) = passage.category {
                buckets.push(category, passage.text);
            }
        }

        for (_, name, texts) in buckets.iter() {
            tracing::info!("Category '{}': {} passages", name, texts.len());
        }

        Ok(ClassificationResult { buckets, excluded })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::AxisEmbedder;
    use proptest::prelude::*;

    const WORDS: &[&str] = &[
        "segmentation",
        "targeting",
        "positioning",
        "differentiation",
        "pricing",
        "product",
        "promotion",
        "distribution",
        "strategy",
        "planning",
        "customers",
        "market",
        "buyers",
    ];

    fn classifier(embedder: AxisEmbedder) -> CategoryClassifier {
        CategoryClassifier::new(
            Arc::new(Taxonomy::default()),
            Arc::new(embedder),
            ClassificationConfig::default(),
            2,
        )
    }

    #[test]
    fn test_nearest_category_prefers_first_on_tie() {
        let centroids = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let (id, score) = nearest_category(&[2.0, 0.0], &centroids).unwrap();
        assert_eq!(id, CategoryId(0));
        assert!((score - 1.0).abs() < 1e-6);

        let (id, _) = nearest_category(&[0.1, 0.9], &centroids).unwrap();
        assert_eq!(id, CategoryId(2));

        assert!(nearest_category(&[1.0], &[]).is_none());
    }

    #[test]
    fn test_zero_vector_goes_to_first_category() {
        let centroids = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let (id, score) = nearest_category(&[0.0, 0.0], &centroids).unwrap();
        assert_eq!(id, CategoryId(0));
        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn test_classify_by_topic() {
        let classifier = classifier(AxisEmbedder::new());
        let passages = vec![
            Passage::new("Demographic segmentation and behavioral segmentation of buyers."),
            Passage::new("Pricing decisions shape how customers perceive the product and the strategy."),
            Passage::new("Positioning builds a value proposition through differentiation."),
        ];

        let result = classifier.classify(passages).await.unwrap();
        let taxonomy = classifier.taxonomy();

        assert_eq!(result.excluded, 0);
        assert_eq!(result.buckets.get(taxonomy.require("Market Segmentation").unwrap()).len(), 1);
        assert_eq!(result.buckets.get(taxonomy.require("Marketing Mix (4Ps)").unwrap()).len(), 1);
        assert_eq!(
            result.buckets.get(taxonomy.require("Differentiation & Positioning").unwrap()).len(),
            1
        );

        let counts = result.buckets.counts();
        assert_eq!(counts.len(), 5);
        assert_eq!(counts["Targeting"], 0);
    }

    #[tokio::test]
    async fn test_long_case_study_is_excluded() {
        let classifier = classifier(AxisEmbedder::new());
        let long_case = format!(
            "Case Study: a regional bakery. {}",
            "Segmentation detail. ".repeat(30)
        );
        let short_case = "A short case study on segmentation.".to_string();
        assert!(long_case.chars().count() > 500);

        let result = classifier
            .classify(vec![Passage::new(long_case), Passage::new(short_case.clone())])
            .await
            .unwrap();

        assert_eq!(result.excluded, 1);
        assert_eq!(result.buckets.total(), 1);
        assert_eq!(result.buckets.get(CategoryId(0)), &[short_case]);
    }

    #[tokio::test]
    async fn test_centroids_computed_once() {
        let embedder = AxisEmbedder::new();
        let calls = embedder.call_counter();
        let classifier = classifier(embedder);

        classifier.warm_up().await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 5);

        classifier.warm_up().await.unwrap();
        classifier
            .classify(vec![Passage::new("segmentation")])
            .await
            .unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_embedding_failure_names_passage() {
        let classifier = classifier(AxisEmbedder::failing_on("broken"));
        let err = classifier
            .classify(vec![Passage::new("segmentation"), Passage::new("broken targeting")])
            .await
            .unwrap_err();

        match err {
            Error::Embedding { context, .. } => assert_eq!(context, "passage #1"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_assigned_category_is_most_similar(
            words in proptest::collection::vec(proptest::sample::select(WORDS.to_vec()), 1..12)
        ) {
            let text = words.join(" ");
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let classifier = classifier(AxisEmbedder::new());
            let result = runtime
                .block_on(classifier.classify(vec![Passage::new(text.clone())]))
                .unwrap();

            let (assigned, _, _) = result
                .buckets
                .iter()
                .find(|(_, _, texts)| !texts.is_empty())
                .unwrap();

            let passage = AxisEmbedder::vector(&text);
            let similarity = |id: CategoryId| {
                let description = &classifier.taxonomy().categories[id.0].description;
                cosine_similarity(&passage, &AxisEmbedder::vector(description))
            };
            let best = similarity(assigned);
            for id in classifier.taxonomy().ids() {
                prop_assert!(similarity(id) <= best);
                if similarity(id) == best {
                    prop_assert!(assigned <= id);
                }
            }
        }
    }

    #[test]
    fn test_buckets_from_named() {
        let taxonomy = Arc::new(Taxonomy::default());
        let buckets = CategoryBuckets::from_named(
            Arc::clone(&taxonomy),
            &[("Targeting", &["a", "b"]), ("market segmentation", &["c"])],
        )
        .unwrap();
        assert_eq!(buckets.total(), 3);
        assert_eq!(buckets.get(CategoryId(1)), &["a".to_string(), "b".to_string()]);

        assert!(CategoryBuckets::from_named(taxonomy, &[("Branding", &["x"])]).is_err());
    }
}
