pub mod accumulation;
pub mod cache;
pub mod sectors;

pub use accumulation::AccumulationStore;
pub use cache::{CacheKey, CacheStats, ResultCache};
pub use sectors::{SectorMap, SectorSource};
