//! Fixed land-cover label catalog for the scene classification band.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Catalog labels in band order. The position of a label is its class index.
pub const LABELS: [&str; 11] = [
    "Saturated or defective",
    "Dark Area Pixels",
    "Cloud Shadows",
    "Vegetation",
    "Bare Soils",
    "Water",
    "Clouds Low Probability / Unclassified",
    "Clouds Medium Probability",
    "Clouds High Probability",
    "Cirrus",
    "Snow / Ice",
];

/// Category selected when no explicit choice has been made yet.
pub const DEFAULT_CATEGORY: &str = "Water";

/// A validated index into [`LABELS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8")]
pub struct ClassIndex(u8);

impl TryFrom<u8> for ClassIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if usize::from(value) < LABELS.len() {
            Ok(ClassIndex(value))
        } else {
            Err(format!("class index {value} outside catalog of {} classes", LABELS.len()))
        }
    }
}

impl ClassIndex {
    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ClassIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category as it arrives from a caller: either a catalog label or a raw index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Category {
    Index(usize),
    Name(String),
}

impl Category {
    pub fn name(label: impl Into<String>) -> Self {
        Category::Name(label.into())
    }
}

/// Digits parse as an index, anything else as a label.
impl FromStr for Category {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Ok(match raw.parse::<usize>() {
            Ok(idx) => Category::Index(idx),
            Err(_) => Category::name(raw),
        })
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Name(DEFAULT_CATEGORY.to_string())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Index(i) => write!(f, "#{i}"),
            Category::Name(n) => f.write_str(n),
        }
    }
}

/// Ordered label list with stable index mapping.
#[derive(Debug, Clone)]
pub struct LandCoverCatalog {
    labels: Vec<String>,
}

impl Default for LandCoverCatalog {
    fn default() -> Self {
        Self {
            labels: LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl LandCoverCatalog {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Resolve a caller-supplied category to its class index.
    ///
    /// Labels match exactly; indices must lie within the catalog.
    pub fn resolve(&self, category: &Category) -> PipelineResult<ClassIndex> {
        let idx = match category {
            Category::Index(i) => *i,
            Category::Name(name) => self
                .labels
                .iter()
                .position(|l| l == name)
                .ok_or_else(|| PipelineError::InvalidCategory(format!("unknown label `{name}`")))?,
        };
        if idx >= self.labels.len() {
            return Err(PipelineError::InvalidCategory(format!(
                "index {idx} outside catalog of {} classes",
                self.labels.len()
            )));
        }
        Ok(ClassIndex(idx as u8))
    }

    pub fn label(&self, index: ClassIndex) -> &str {
        &self.labels[index.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_resolves_to_five() {
        let catalog = LandCoverCatalog::default();
        let idx = catalog.resolve(&Category::name("Water")).unwrap();
        assert_eq!(idx.value(), 5);
        assert_eq!(catalog.label(idx), "Water");
    }

    #[test]
    fn default_category_is_water() {
        let catalog = LandCoverCatalog::default();
        assert_eq!(catalog.resolve(&Category::default()).unwrap().value(), 5);
    }

    #[test]
    fn every_index_round_trips_through_its_label() {
        let catalog = LandCoverCatalog::default();
        assert_eq!(catalog.len(), 11);
        for (i, label) in LABELS.iter().enumerate() {
            let idx = catalog.resolve(&Category::name(*label)).unwrap();
            assert_eq!(idx.value() as usize, i);
            assert_eq!(catalog.resolve(&Category::Index(i)).unwrap(), idx);
        }
    }

    #[test]
    fn index_eleven_is_rejected() {
        let catalog = LandCoverCatalog::default();
        let err = catalog.resolve(&Category::Index(11)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCategory(_)));
    }

    #[test]
    fn label_match_is_case_sensitive() {
        let catalog = LandCoverCatalog::default();
        assert!(catalog.resolve(&Category::name("water")).is_err());
    }

    #[test]
    fn category_deserializes_from_name_or_index() {
        let by_index: Category = serde_json::from_str("3").unwrap();
        let by_name: Category = serde_json::from_str("\"Cirrus\"").unwrap();
        assert_eq!(by_index, Category::Index(3));
        assert_eq!(by_name, Category::name("Cirrus"));
    }

    #[test]
    fn deserialized_class_index_is_range_checked() {
        let ok: ClassIndex = serde_json::from_str("10").unwrap();
        assert_eq!(LandCoverCatalog::default().label(ok), "Snow / Ice");
        assert!(serde_json::from_str::<ClassIndex>("11").is_err());
    }

    #[test]
    fn category_parses_from_command_line_text() {
        assert_eq!(" 5 ".parse::<Category>(), Ok(Category::Index(5)));
        assert_eq!("Bare Soils".parse::<Category>(), Ok(Category::name("Bare Soils")));
    }
}
