use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

/// Fitting categories and their identifier prefixes. The table is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Rail clips")]
    RailClips,
    #[serde(rename = "Rail liners")]
    RailLiners,
    #[serde(rename = "Fish Plates")]
    FishPlates,
    #[serde(rename = "Rail Anchors")]
    RailAnchors,
    #[serde(rename = "Rail Dowels")]
    RailDowels,
}

impl Category {
    /// Human-readable label as shown in the category selector.
    pub fn label(self) -> &'static str {
        match self {
            Category::RailClips => "Rail clips",
            Category::RailLiners => "Rail liners",
            Category::FishPlates => "Fish Plates",
            Category::RailAnchors => "Rail Anchors",
            Category::RailDowels => "Rail Dowels",
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Category::RailClips => "RC",
            Category::RailLiners => "RL",
            Category::FishPlates => "FP",
            Category::RailAnchors => "RA",
            Category::RailDowels => "RD",
        }
    }

    /// Counter key in the persistent store: `qr_counter_<PREFIX>`.
    pub fn storage_key(self) -> String {
        format!("qr_counter_{}", self.prefix())
    }

    /// Exact label lookup.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::iter().find(|c| c.label() == label)
    }

    /// Prefix lookup, case-insensitive (`rc` -> `Rail clips`).
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::iter().find(|c| c.prefix().eq_ignore_ascii_case(prefix))
    }

    /// Selector input: an exact label or a prefix. Anything else is not a category.
    pub fn lookup(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        Self::from_label(input).or_else(|| Self::from_prefix(input))
    }

    pub fn all() -> impl Iterator<Item = Category> {
        Self::iter()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_five_distinct_prefixes() {
        let prefixes: Vec<_> = Category::all().map(Category::prefix).collect();
        assert_eq!(prefixes, vec!["RC", "RL", "FP", "RA", "RD"]);
    }

    #[test]
    fn lookup_by_label_is_exact() {
        assert_eq!(Category::from_label("Fish Plates"), Some(Category::FishPlates));
        assert_eq!(Category::from_label("fish plates"), None);
        assert_eq!(Category::from_label("Sleepers"), None);
    }

    #[test]
    fn lookup_accepts_label_or_prefix() {
        assert_eq!(Category::lookup("Rail clips"), Some(Category::RailClips));
        assert_eq!(Category::lookup(" rd "), Some(Category::RailDowels));
        assert_eq!(Category::lookup(""), None);
        assert_eq!(Category::lookup("XX"), None);
    }

    #[test]
    fn storage_key_uses_prefix() {
        assert_eq!(Category::RailAnchors.storage_key(), "qr_counter_RA");
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&Category::RailLiners).expect("serialize");
        assert_eq!(json, "\"Rail liners\"");
    }
}
