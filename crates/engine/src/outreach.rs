//! Vendor outreach simulation.
//!
//! No vendors are really contacted. An [`OutreachSimulator`] produces a quote
//! summary per material and a shortlist of mock vendors when a run finishes.
//! [`RandomOutreach`] draws from the reference ranges; [`FixedOutreach`]
//! returns fixed values so runs are reproducible.

use std::collections::HashSet;

use rand::Rng;
use vendorflow_storage::{Execution, Guardrails, Material, Vendor, VendorStatus};

/// Summary of the vendor responses for one material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub vendor_count: u32,
    pub best_price: f64,
    /// Days.
    pub fastest_delivery: u32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OutreachError {
    #[error("no vendor reachable for '{material}'")]
    Unreachable { material: String },
}

/// Source of outreach results for the processing engine.
pub trait OutreachSimulator: Send + Sync {
    /// Survey vendors for one material.
    fn survey(&self, material: &Material, guardrails: &Guardrails) -> Result<Quote, OutreachError>;

    /// Build `count` vendors for a finished execution, priced against its
    /// first material.
    fn shortlist(&self, execution: &Execution, count: usize) -> Vec<Vendor>;
}

/// Randomized outreach.
///
/// - vendor count in `[1, 5]`
/// - best price in `rate * [0.8, 1.2)`
/// - fastest delivery in `[1, 7]` days
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOutreach;

impl OutreachSimulator for RandomOutreach {
    fn survey(&self, material: &Material, _guardrails: &Guardrails) -> Result<Quote, OutreachError> {
        let mut rng = rand::thread_rng();
        Ok(Quote {
            vendor_count: rng.gen_range(1..=5),
            best_price: material.rate * rng.gen_range(0.8..1.2),
            fastest_delivery: rng.gen_range(1..=7),
        })
    }

    fn shortlist(&self, execution: &Execution, count: usize) -> Vec<Vendor> {
        let mut rng = rand::thread_rng();
        let base_rate = execution.materials.first().map(|m| m.rate);
        (0..count)
            .map(|i| {
                let price = base_rate.map(|rate| rate * rng.gen_range(0.8..1.2));
                mock_vendor(i, price, rng.gen_range(1..=7))
            })
            .collect()
    }
}

/// Deterministic outreach for tests and demos.
#[derive(Debug, Clone)]
pub struct FixedOutreach {
    pub vendor_count: u32,
    /// Multiplier applied to the material rate.
    pub price_factor: f64,
    pub delivery_days: u32,
    failing: HashSet<String>,
}

impl Default for FixedOutreach {
    fn default() -> Self {
        Self {
            vendor_count: 3,
            price_factor: 1.0,
            delivery_days: 2,
            failing: HashSet::new(),
        }
    }
}

impl FixedOutreach {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `survey` fail for the material with this name.
    pub fn failing_on(mut self, material: impl Into<String>) -> Self {
        self.failing.insert(material.into());
        self
    }
}

impl OutreachSimulator for FixedOutreach {
    fn survey(&self, material: &Material, _guardrails: &Guardrails) -> Result<Quote, OutreachError> {
        if self.failing.contains(&material.name) {
            return Err(OutreachError::Unreachable {
                material: material.name.clone(),
            });
        }
        Ok(Quote {
            vendor_count: self.vendor_count,
            best_price: material.rate * self.price_factor,
            fastest_delivery: self.delivery_days,
        })
    }

    fn shortlist(&self, execution: &Execution, count: usize) -> Vec<Vendor> {
        let price = execution
            .materials
            .first()
            .map(|m| m.rate * self.price_factor);
        (0..count)
            .map(|i| mock_vendor(i, price, self.delivery_days))
            .collect()
    }
}

/// Vendor `i` of a shortlist: "Vendor A", "Vendor B", ...
fn mock_vendor(i: usize, price: Option<f64>, delivery_time: u32) -> Vendor {
    let offset = (i % 26) as u8;
    let upper = (b'A' + offset) as char;
    let lower = (b'a' + offset) as char;
    Vendor {
        id: uuid::Uuid::new_v4().to_string(),
        name: format!("Vendor {upper}"),
        email: format!("vendor{lower}@example.com"),
        phone: format!("+91 98765432{i}0"),
        website: format!("https://vendor{lower}.com"),
        price,
        delivery_time,
        certifications: vec!["FSSAI".to_string()],
        status: VendorStatus::Contacted,
        response_date: None,
        notes: String::new(),
    }
}
