//! Domain lexicon for query expansion and intent detection
//!
//! The lexicon is plain data: synonym groups keyed by a base term, an
//! ordered list of intent categories, and the file extensions treated as
//! images. The default tables target Russian-language construction
//! documentation; a deployment can replace them wholesale from a TOML file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{MmIndexError, Result};

/// Name of the fallback intent category every query carries a little of
pub const GENERAL_INTENT: &str = "general";

/// One intent category: its name and the keywords that trigger it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Synonym and category tables driving the heuristic retrieval layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    /// lowercase file extensions classified as photos
    pub image_extensions: Vec<String>,
    /// base term -> synonyms substituted into query variants
    pub synonyms: BTreeMap<String, Vec<String>>,
    /// Intent categories in classification precedence order: the first rule
    /// a document matches wins, and the image-extension check runs at the
    /// `photos` position in this list
    pub categories: Vec<CategoryRule>,
}

impl Default for Lexicon {
    fn default() -> Self {
        let synonyms = BTreeMap::from([
            (
                "окна".to_string(),
                svec(&["окно", "оконный", "остекление", "рама", "стеклопакет"]),
            ),
            (
                "двери".to_string(),
                svec(&["дверь", "дверной", "проем", "полотно", "коробка"]),
            ),
            (
                "спецификация".to_string(),
                svec(&["перечень", "список", "состав", "ведомость", "таблица"]),
            ),
            (
                "фасад".to_string(),
                svec(&["фасадный", "наружный", "внешний", "облицовка"]),
            ),
            (
                "геология".to_string(),
                svec(&["геологический", "грунт", "изыскания", "почва"]),
            ),
            (
                "проект".to_string(),
                svec(&["проектный", "чертеж", "план", "схема"]),
            ),
        ]);

        // Precedence matters: specification keywords beat drawing keywords,
        // and an image extension decides "photos" before drawings are tried
        let categories = vec![
            CategoryRule {
                name: "specifications".to_string(),
                keywords: svec(&["спецификация", "ведомость", "перечень", "таблица"]),
            },
            CategoryRule {
                name: "geology".to_string(),
                keywords: svec(&["геология", "изыскания", "грунт", "почва"]),
            },
            CategoryRule {
                name: "photos".to_string(),
                keywords: svec(&["фото", "изображение", "снимок", "img"]),
            },
            CategoryRule {
                name: "drawings".to_string(),
                keywords: svec(&["чертеж", "план", "схема", "проект"]),
            },
        ];

        Self {
            image_extensions: svec(&["jpg", "jpeg", "png"]),
            synonyms,
            categories,
        }
    }
}

fn svec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Lexicon {
    /// Load a replacement lexicon from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| MmIndexError::Io {
            source,
            context: format!("reading lexicon {}", path.display()),
        })?;
        let lexicon: Lexicon = toml::from_str(&content)?;
        Ok(lexicon)
    }

    /// Expand a query into variants by substituting synonyms for each base
    /// term it contains. The original query is always the first variant.
    pub fn expand_query(&self, query: &str) -> Vec<String> {
        let query_lower = query.to_lowercase();
        let mut variants = vec![query.to_string()];

        for (base_word, synonyms) in &self.synonyms {
            if query_lower.contains(base_word.as_str()) {
                for synonym in synonyms {
                    let variant = query_lower.replace(base_word.as_str(), synonym);
                    if variant != query_lower {
                        variants.push(variant);
                    }
                }
            }
        }

        variants
    }

    /// Whether a filename has one of the configured image extensions
    pub fn is_image_file(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        self.image_extensions
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_query_keeps_original_first() {
        let lexicon = Lexicon::default();
        let variants = lexicon.expand_query("спецификация окон");
        assert_eq!(variants[0], "спецификация окон");
        assert!(variants.len() > 1);
    }

    #[test]
    fn test_expand_query_substitutes_synonyms() {
        let lexicon = Lexicon::default();
        let variants = lexicon.expand_query("геология участка");
        assert!(variants.iter().any(|v| v.contains("грунт")));
        assert!(variants.iter().any(|v| v.contains("изыскания")));
    }

    #[test]
    fn test_expand_query_without_known_terms() {
        let lexicon = Lexicon::default();
        let variants = lexicon.expand_query("совершенно другой запрос");
        assert_eq!(variants, vec!["совершенно другой запрос".to_string()]);
    }

    #[test]
    fn test_is_image_file() {
        let lexicon = Lexicon::default();
        assert!(lexicon.is_image_file("facade_photo.JPG"));
        assert!(lexicon.is_image_file("site.png"));
        assert!(!lexicon.is_image_file("report.pdf"));
    }

    #[test]
    fn test_toml_round_trip() {
        let lexicon = Lexicon::default();
        let toml_text = toml::to_string(&lexicon).unwrap();
        let restored: Lexicon = toml::from_str(&toml_text).unwrap();
        assert_eq!(restored.synonyms.len(), lexicon.synonyms.len());
        assert_eq!(restored.categories.len(), lexicon.categories.len());
    }
}
