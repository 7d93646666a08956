//! Topic taxonomy: category names, descriptions and keyword hints

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};

/// Position of a category in its taxonomy (declaration order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(pub usize);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One topic bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Display name, also the key of its index
    pub name: String,
    /// Text embedded to form the category centroid
    pub description: String,
    /// Words that route free text to this category
    #[serde(default)]
    pub hint_keywords: Vec<String>,
}

impl Category {
    pub fn new(name: &str, description: &str, hint_keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            hint_keywords: hint_keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Fixed category set shared by every tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Taxonomy {
    /// Categories in declaration order; ties resolve to the earliest
    pub categories: Vec<Category>,
    /// Keywords a passage must all contain to be preferred by re-ranking
    pub rerank_keywords: Vec<String>,
    /// Category used when no hint keyword matches
    pub default_category: Option<String>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::marketing_strategy()
    }
}

impl Taxonomy {
    /// The five-step strategic marketing taxonomy
    pub fn marketing_strategy() -> Self {
        Self {
            categories: vec![
                Category::new(
                    "Market Segmentation",
                    "Defining market segmentation, types of segmentation (demographic, geographic, psychographic, behavioral).",
                    &["segmentation"],
                ),
                Category::new(
                    "Targeting",
                    "Market targeting strategies, choosing a target market, evaluating segments.",
                    &["targeting"],
                ),
                Category::new(
                    "Differentiation & Positioning",
                    "Positioning strategy, points of differentiation, value proposition.",
                    &["differentiation", "positioning"],
                ),
                Category::new(
                    "Marketing Mix (4Ps)",
                    "Product strategy, pricing strategy, placement/distribution, promotion strategy.",
                    &["pricing", "product"],
                ),
                Category::new(
                    "Marketing Strategy & Planning",
                    "Customer-driven marketing strategy, strategic planning process, competitive advantage.",
                    &[],
                ),
            ],
            rerank_keywords: ["segmentation", "targeting", "differentiation", "positioning"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            default_category: Some("Marketing Strategy & Planning".to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Category ids in declaration order
    pub fn ids(&self) -> impl Iterator<Item = CategoryId> {
        (0..self.categories.len()).map(CategoryId)
    }

    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(id.0)
    }

    /// Name of a category; ids come from this taxonomy
    pub fn name(&self, id: CategoryId) -> &str {
        self.categories
            .get(id.0)
            .map(|c| c.name.as_str())
            .unwrap_or("unknown")
    }

    /// Look up a category by name, exact match first, then ignoring case
    pub fn resolve(&self, name: &str) -> Option<CategoryId> {
        let name = name.trim();
        self.categories
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.categories
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
            .map(CategoryId)
    }

    /// Resolve or fail with `UnknownCategory`
    pub fn require(&self, name: &str) -> Result<CategoryId> {
        self.resolve(name)
            .ok_or_else(|| Error::UnknownCategory(name.to_string()))
    }

    /// Fallback category for hint routing
    pub fn default_category_id(&self) -> Option<CategoryId> {
        self.default_category
            .as_deref()
            .and_then(|name| self.resolve(name))
    }

    /// Pick the categories a free-text answer talks about
    ///
    /// Every category whose hint keywords occur in the text is returned in
    /// declaration order; if none match, the default category is used.
    pub fn categories_for_text(&self, text: &str) -> Vec<CategoryId> {
        let lowered = text.to_lowercase();
        let matched: Vec<CategoryId> = self
            .ids()
            .filter(|id| {
                self.categories[id.0]
                    .hint_keywords
                    .iter()
                    .any(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
            })
            .collect();

        if matched.is_empty() {
            self.default_category_id().into_iter().collect()
        } else {
            matched
        }
    }

    /// Check the taxonomy is usable
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(Error::Config("taxonomy must declare at least one category".into()));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(Error::Config("category names must not be empty".into()));
            }
            if category.description.trim().is_empty() {
                return Err(Error::Config(format!(
                    "category '{}' has an empty description",
                    category.name
                )));
            }
            if !seen.insert(category.name.to_lowercase()) {
                return Err(Error::Config(format!(
                    "duplicate category name '{}'",
                    category.name
                )));
            }
        }

        if let Some(default) = &self.default_category {
            if self.resolve(default).is_none() {
                return Err(Error::Config(format!(
                    "default_category '{}' is not a declared category",
                    default
                )));
            }
        }

        Ok(())
    }
}
