use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AlignError;

/// Source category of a dataset.
///
/// The derived `Ord` is the dense processing order, which is also the
/// column order of a dense table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Prices,
    Financials,
    Filings,
    News,
    #[serde(alias = "executives")]
    Organization,
}

impl Category {
    /// Join order for dense alignment.
    pub const PROCESSING_ORDER: [Category; 5] = [
        Category::Prices,
        Category::Financials,
        Category::Filings,
        Category::News,
        Category::Organization,
    ];

    /// Reference-clock preference for sparse alignment, sparsest first.
    ///
    /// This is a fixed policy, not a measurement: the first non-empty dataset
    /// in this order becomes the reference even if a later one happens to hold
    /// fewer points for a given entity.
    pub const SPARSITY_RANK: [Category; 5] = [
        Category::Organization,
        Category::Filings,
        Category::Financials,
        Category::News,
        Category::Prices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Prices => "prices",
            Category::Financials => "financials",
            Category::Filings => "filings",
            Category::News => "news",
            Category::Organization => "organization",
        }
    }

    /// Position in [`Category::SPARSITY_RANK`] (0 = sparsest).
    pub fn sparsity_rank(&self) -> usize {
        match self {
            Category::Organization => 0,
            Category::Filings => 1,
            Category::Financials => 2,
            Category::News => 3,
            Category::Prices => 4,
        }
    }

    /// Parse a comma-separated category list such as `"prices, news"`.
    ///
    /// Blank entries are skipped; duplicates collapse.
    pub fn parse_list(list: &str) -> Result<Vec<Category>, AlignError> {
        let mut out = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let category: Category = part.parse()?;
            if !out.contains(&category) {
                out.push(category);
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prices" => Ok(Category::Prices),
            "financials" => Ok(Category::Financials),
            "filings" => Ok(Category::Filings),
            "news" => Ok(Category::News),
            "organization" | "executives" => Ok(Category::Organization),
            other => Err(AlignError::UnknownCategory(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparsity_rank_matches_constant() {
        for (i, category) in Category::SPARSITY_RANK.iter().enumerate() {
            assert_eq!(category.sparsity_rank(), i);
        }
    }

    #[test]
    fn ord_follows_processing_order() {
        let mut shuffled = vec![
            Category::News,
            Category::Organization,
            Category::Prices,
            Category::Filings,
            Category::Financials,
        ];
        shuffled.sort();
        assert_eq!(shuffled, Category::PROCESSING_ORDER.to_vec());
    }

    #[test]
    fn parses_names_and_alias() {
        assert_eq!("Prices".parse::<Category>().unwrap(), Category::Prices);
        assert_eq!("executives".parse::<Category>().unwrap(), Category::Organization);
        assert!(matches!(
            "patents".parse::<Category>(),
            Err(AlignError::UnknownCategory(name)) if name == "patents"
        ));
    }

    #[test]
    fn parse_list_skips_blanks_and_duplicates() {
        let parsed = Category::parse_list("prices, ,news,prices").unwrap();
        assert_eq!(parsed, vec![Category::Prices, Category::News]);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Category::Organization).unwrap();
        assert_eq!(json, "\"organization\"");
        let back: Category = serde_json::from_str("\"executives\"").unwrap();
        assert_eq!(back, Category::Organization);
    }
}
