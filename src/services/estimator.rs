//! Repair cost estimation.
//!
//! Precedence: historical solution costs, then the remote model, then a
//! per-category base cost. Every path applies random jitter from an
//! injected RNG and the result is always within [`MIN_COST`, `MAX_COST`].

use rand::Rng;
use std::sync::Arc;

use super::provider::{ClassificationProvider, MAX_COST, MIN_COST};
use super::solutions::SolutionRepository;
use crate::domain::maintenance::EstimateSource;
use crate::domain::Category;

/// Jitter applied to the historical mean.
const HISTORICAL_JITTER: (f64, f64) = (0.8, 1.2);
/// Jitter applied to the base cost table.
const FALLBACK_JITTER: (f64, f64) = (0.7, 1.3);

/// Base repair cost per category.
pub fn base_cost(category: Category) -> f64 {
    match category {
        Category::Plumbing => 150.0,
        Category::Electrical => 200.0,
        Category::Hvac => 300.0,
        Category::Structural => 400.0,
        Category::Appliance => 250.0,
        Category::Other => 100.0,
    }
}

/// Deterministic fallback: base cost times U[0.7, 1.3], rounded to cents.
pub fn fallback_cost<R: Rng>(category: Category, rng: &mut R) -> f64 {
    round_cents(base_cost(category) * rng.gen_range(FALLBACK_JITTER.0..=FALLBACK_JITTER.1))
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone)]
pub struct CostEstimator {
    solutions: Arc<dyn SolutionRepository>,
    remote: Option<Arc<dyn ClassificationProvider>>,
}

impl CostEstimator {
    pub fn new(
        solutions: Arc<dyn SolutionRepository>,
        remote: Option<Arc<dyn ClassificationProvider>>,
    ) -> Self {
        Self { solutions, remote }
    }

    /// Estimate a repair cost. Never fails.
    pub async fn estimate<R: Rng + Send>(
        &self,
        description: &str,
        category: Category,
        rng: &mut R,
    ) -> (f64, EstimateSource) {
        let history = match self.solutions.historical_costs(category).await {
            Ok(costs) => costs,
            Err(e) => {
                tracing::warn!(error = %e, category = %category, "Historical costs unavailable");
                Vec::new()
            }
        };

        if !history.is_empty() {
            let mean = history.iter().sum::<f64>() / history.len() as f64;
            let jitter = rng.gen_range(HISTORICAL_JITTER.0..=HISTORICAL_JITTER.1);
            return (clamp_cost(mean * jitter), EstimateSource::Historical);
        }

        if let Some(remote) = &self.remote {
            match remote.estimate_cost(description, category).await {
                Ok(cost) => return (clamp_cost(cost), EstimateSource::Remote),
                Err(e) => {
                    tracing::warn!(error = %e, "Remote cost estimate unavailable, using base cost table");
                }
            }
        }

        (clamp_cost(fallback_cost(category, rng)), EstimateSource::Fallback)
    }
}

fn clamp_cost(value: f64) -> f64 {
    round_cents(value.clamp(MIN_COST, MAX_COST))
}
