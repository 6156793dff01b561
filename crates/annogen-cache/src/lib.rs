pub mod alias_cache;
pub mod generation_cache;
pub mod generator;

pub use alias_cache::*;
pub use generation_cache::*;
pub use generator::*;
