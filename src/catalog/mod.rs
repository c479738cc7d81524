//! Static pricing and tier lookup tables.
//!
//! Both tables are read-only after construction and shared without locking.

pub mod pricing;
pub mod tier;

pub use pricing::{round_usd, ModelPricing, PricingTable, DEFAULT_PRICING};
pub use tier::{Tier, TierDefinition};
