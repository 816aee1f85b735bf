//! Dataset loader contract.
//!
//! The engine never reaches out for data itself: a loader is handed to it at
//! construction. Loaders return an empty dataset when nothing exists for an
//! entity and reserve errors for persisted data they cannot read.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Category, Dataset, Datasets};
use crate::error::SourceReadError;

/// One load function per source category.
pub trait DatasetLoader: Send + Sync {
    fn load_prices(&self, entity: &str) -> Result<Dataset, SourceReadError>;

    fn load_financials(&self, entity: &str) -> Result<Dataset, SourceReadError>;

    fn load_filings(&self, entity: &str) -> Result<Dataset, SourceReadError>;

    fn load_news(&self, entity: &str) -> Result<Dataset, SourceReadError>;

    fn load_organization(&self, entity: &str) -> Result<Dataset, SourceReadError>;

    /// Dispatch to the per-category function.
    fn load(&self, category: Category, entity: &str) -> Result<Dataset, SourceReadError> {
        match category {
            Category::Prices => self.load_prices(entity),
            Category::Financials => self.load_financials(entity),
            Category::Filings => self.load_filings(entity),
            Category::News => self.load_news(entity),
            Category::Organization => self.load_organization(entity),
        }
    }

    /// Load all five categories. The first read error aborts the load.
    fn load_all(&self, entity: &str) -> Result<Datasets, SourceReadError> {
        Category::PROCESSING_ORDER
            .iter()
            .map(|category| self.load(*category, entity))
            .collect()
    }
}

macro_rules! forward_loader {
    ($($ptr:ty),+) => {$(
        impl<L: DatasetLoader + ?Sized> DatasetLoader for $ptr {
            fn load_prices(&self, entity: &str) -> Result<Dataset, SourceReadError> {
                (**self).load_prices(entity)
            }

            fn load_financials(&self, entity: &str) -> Result<Dataset, SourceReadError> {
                (**self).load_financials(entity)
            }

            fn load_filings(&self, entity: &str) -> Result<Dataset, SourceReadError> {
                (**self).load_filings(entity)
            }

            fn load_news(&self, entity: &str) -> Result<Dataset, SourceReadError> {
                (**self).load_news(entity)
            }

            fn load_organization(&self, entity: &str) -> Result<Dataset, SourceReadError> {
                (**self).load_organization(entity)
            }
        }
    )+};
}

forward_loader!(&L, Box<L>, Arc<L>);

/// Loader over datasets held in memory, keyed by entity and category.
///
/// Unknown entities load as empty datasets.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    datasets: HashMap<(String, Category), Dataset>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: impl Into<String>, dataset: Dataset) {
        self.datasets.insert((entity.into(), dataset.category), dataset);
    }

    pub fn with(mut self, entity: impl Into<String>, dataset: Dataset) -> Self {
        self.insert(entity, dataset);
        self
    }

    fn get(&self, entity: &str, category: Category) -> Dataset {
        self.datasets
            .get(&(entity.to_string(), category))
            .cloned()
            .unwrap_or_else(|| Dataset::empty(category))
    }
}

impl DatasetLoader for InMemoryLoader {
    fn load_prices(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        Ok(self.get(entity, Category::Prices))
    }

    fn load_financials(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        Ok(self.get(entity, Category::Financials))
    }

    fn load_filings(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        Ok(self.get(entity, Category::Filings))
    }

    fn load_news(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        Ok(self.get(entity, Category::News))
    }

    fn load_organization(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        Ok(self.get(entity, Category::Organization))
    }
}
