mod generator;

pub use generator::MapperGenerator;

use annogen_cache::GenerationCache;
use annogen_core::{
    Annotation, AnnogenError, Declaration, DeclarationShape, KindSpec, MarkerRegistry, Node,
    Processor, Result,
};
use annogen_parser::PackageNameSniffer;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

pub const MAPPER: &str = "Mapper";
pub const MAPPING: &str = "Mapping";
pub const SLICE_MAPPING: &str = "SliceMapping";
pub const MAP_MAPPING: &str = "MapMapping";
pub const IGNORE_DEFAULT_MAPPING: &str = "IgnoreDefaultMapping";

pub const DEFAULT_OUTPUT_FILE: &str = "mappers.gen.go";

/// `@Mapper` on interfaces; the mapping kinds are read from interface methods.
pub struct MapperProcessor {
    cache: GenerationCache,
    file_name: String,
}

impl MapperProcessor {
    pub fn new(sniffer: Arc<PackageNameSniffer>, file_name: impl Into<String>) -> Self {
        Self {
            cache: GenerationCache::new(sniffer),
            file_name: file_name.into(),
        }
    }

    pub fn register(self: Arc<Self>, registry: &mut MarkerRegistry) {
        registry.register(MAPPER, self);
        registry.register_noop(KindSpec::repeatable(MAPPING));
        registry.register_noop(KindSpec::repeatable(SLICE_MAPPING));
        registry.register_noop(KindSpec::repeatable(MAP_MAPPING));
        registry.register_noop(IGNORE_DEFAULT_MAPPING);
    }
}

impl Processor for MapperProcessor {
    fn name(&self) -> &str {
        "Mapper"
    }

    fn version(&self) -> &str {
        "0.0.1-alpha"
    }

    fn required_shape(&self, _kind: &str) -> DeclarationShape {
        DeclarationShape::Interface
    }

    fn process(&self, _kind: &str, node: &Node, annotations: &[&Annotation]) -> Result<()> {
        let Declaration::Interface(decl) = &node.declaration else {
            return Err(AnnogenError::InvalidOperation(format!(
                "@{} reached {} which is not an interface",
                MAPPER,
                node.name()
            )));
        };
        let Some(annotation) = annotations.first() else {
            return Ok(());
        };

        let struct_name = annotation
            .param("name")
            .map_or_else(|| format!("{}Impl", decl.name), str::to_string);
        if struct_name == decl.name {
            return Err(AnnogenError::generator(
                self.name(),
                format!("mapper for {} cannot reuse the interface name", decl.name),
            ));
        }

        self.cache.add_generator(
            node.unit_key(),
            format!("{}:{}", MAPPER, decl.name),
            node.meta.order,
            Box::new(MapperGenerator::new(
                struct_name,
                decl.clone(),
                node.meta.clone(),
            )),
        );
        Ok(())
    }

    fn output(&self) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
        self.cache.finalize(&self.file_name)
    }
}
