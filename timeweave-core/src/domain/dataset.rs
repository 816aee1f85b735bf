use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::category::Category;
use super::series::Series;

/// A named series for one source category. Empty is a valid state.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub category: Category,
    pub series: Series,
}

impl Dataset {
    pub fn new(category: Category, series: Series) -> Self {
        Self { category, series }
    }

    pub fn empty(category: Category) -> Self {
        Self::new(category, Series::new())
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn coverage(&self) -> DatasetCoverage {
        DatasetCoverage {
            category: self.category,
            points: self.series.len(),
            first_date: self.series.first_date(),
            last_date: self.series.last_date(),
        }
    }
}

/// Point count and date span of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetCoverage {
    pub category: Category,
    pub points: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// All datasets loaded for one entity, at most one per category.
///
/// Iteration follows the dense processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datasets {
    by_category: BTreeMap<Category, Dataset>,
}

impl Datasets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a dataset, replacing any earlier one for the same category.
    pub fn insert(&mut self, dataset: Dataset) {
        self.by_category.insert(dataset.category, dataset);
    }

    pub fn with(mut self, dataset: Dataset) -> Self {
        self.insert(dataset);
        self
    }

    pub fn get(&self, category: Category) -> Option<&Dataset> {
        self.by_category.get(&category)
    }

    /// The dataset for `category`, if present and non-empty.
    pub fn non_empty(&self, category: Category) -> Option<&Dataset> {
        self.get(category).filter(|d| !d.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dataset> + '_ {
        self.by_category.values()
    }

    /// Non-empty datasets in processing order.
    pub fn iter_non_empty(&self) -> impl Iterator<Item = &Dataset> + '_ {
        self.iter().filter(|d| !d.is_empty())
    }

    /// Categories holding at least one point, in processing order.
    pub fn available(&self) -> Vec<Category> {
        self.iter_non_empty().map(|d| d.category).collect()
    }

    pub fn all_empty(&self) -> bool {
        self.iter_non_empty().next().is_none()
    }

    /// First non-empty category in [`Category::SPARSITY_RANK`].
    pub fn sparsest(&self) -> Option<&Dataset> {
        Category::SPARSITY_RANK
            .iter()
            .find_map(|category| self.non_empty(*category))
    }

    pub fn coverage(&self) -> Vec<DatasetCoverage> {
        self.iter().map(Dataset::coverage).collect()
    }
}

impl FromIterator<Dataset> for Datasets {
    fn from_iter<T: IntoIterator<Item = Dataset>>(iter: T) -> Self {
        let mut datasets = Datasets::new();
        for dataset in iter {
            datasets.insert(dataset);
        }
        datasets
    }
}
