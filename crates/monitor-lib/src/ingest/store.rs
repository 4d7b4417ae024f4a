//! Read-only query access to the telemetry registry

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{Category, SampleRecord};
use crate::series::CategoryRegistry;

/// A configured category as listed to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    pub unit: String,
    pub cadences_secs: Vec<u64>,
}

/// Cloneable query handle
///
/// Every read holds the registry lock only long enough to copy out the
/// answer, so callers always see a consistent snapshot.
#[derive(Clone)]
pub struct TelemetryStore {
    registry: Arc<RwLock<CategoryRegistry>>,
}

impl TelemetryStore {
    pub(crate) fn new(registry: Arc<RwLock<CategoryRegistry>>) -> Self {
        Self { registry }
    }

    pub async fn history(&self, category: Category, cadence: Duration) -> Result<Vec<SampleRecord>> {
        self.registry.read().await.history(category, cadence)
    }

    pub async fn deltas(&self, category: Category, cadence: Duration) -> Result<Vec<SampleRecord>> {
        self.registry.read().await.deltas(category, cadence)
    }

    pub async fn unit(&self, category: Category) -> Result<String> {
        self.registry.read().await.unit(category).map(str::to_string)
    }

    pub async fn cadences(&self, category: Category) -> Result<Vec<Duration>> {
        self.registry.read().await.cadences(category)
    }

    pub async fn categories(&self) -> Vec<CategorySummary> {
        let registry = self.registry.read().await;
        registry
            .categories()
            .filter_map(|category| {
                let unit = registry.unit(category).ok()?.to_string();
                let cadences_secs = registry
                    .cadences(category)
                    .ok()?
                    .into_iter()
                    .map(|c| c.as_secs())
                    .collect();
                Some(CategorySummary {
                    category,
                    unit,
                    cadences_secs,
                })
            })
            .collect()
    }
}
