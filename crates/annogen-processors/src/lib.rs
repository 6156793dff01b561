pub mod common;
pub mod constructor;
pub mod mapper;

pub use constructor::ConstructorProcessor;
pub use mapper::MapperProcessor;

use annogen_core::{MarkerRegistry, OutputConfig};
use annogen_parser::PackageNameSniffer;
use std::sync::Arc;

/// A registry with the constructor and mapper families registered.
pub fn builtin_registry(sniffer: Arc<PackageNameSniffer>, output: &OutputConfig) -> MarkerRegistry {
    let mut registry = MarkerRegistry::new();
    Arc::new(ConstructorProcessor::new(
        sniffer.clone(),
        output.constructor_file.clone(),
    ))
    .register(&mut registry);
    Arc::new(MapperProcessor::new(sniffer, output.mapper_file.clone())).register(&mut registry);
    registry
}
