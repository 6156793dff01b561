//! Constructor family: `@Constructor`, `@Optional`, `@Builder` on structs and
//! `@PostConstruct` on methods. `@Exclude` and `@Init` are read from fields.

mod generators;

pub use generators::*;

use annogen_cache::{GenerationCache, Generator, PostConstructHook};
use annogen_core::{
    Annotation, AnnogenError, Declaration, DeclarationShape, MarkerRegistry, Node, Processor,
    Result,
};
use annogen_parser::PackageNameSniffer;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub const CONSTRUCTOR: &str = "Constructor";
pub const OPTIONAL: &str = "Optional";
pub const BUILDER: &str = "Builder";
pub const POST_CONSTRUCT: &str = "PostConstruct";
pub const EXCLUDE: &str = "Exclude";
pub const INIT: &str = "Init";

pub const DEFAULT_OUTPUT_FILE: &str = "constructor.gen.go";

pub struct ConstructorProcessor {
    cache: GenerationCache,
    file_name: String,
}

impl ConstructorProcessor {
    pub fn new(sniffer: Arc<PackageNameSniffer>, file_name: impl Into<String>) -> Self {
        Self {
            cache: GenerationCache::new(sniffer),
            file_name: file_name.into(),
        }
    }

    /// Registers every kind of the family with `registry`.
    pub fn register(self: Arc<Self>, registry: &mut MarkerRegistry) {
        for kind in [CONSTRUCTOR, OPTIONAL, BUILDER, POST_CONSTRUCT] {
            registry.register(kind, self.clone());
        }
        registry.register_noop(EXCLUDE);
        registry.register_noop(INIT);
    }

    fn add_struct_generator(&self, kind: &str, node: &Node, annotation: &Annotation) -> Result<()> {
        let Declaration::Struct(decl) = &node.declaration else {
            return Err(AnnogenError::InvalidOperation(format!(
                "@{} reached {} which is not a struct",
                kind,
                node.name()
            )));
        };
        let target = StructTarget::new(decl.clone(), node.meta.clone());
        let name = &decl.name;

        let generator: Box<dyn Generator> = match kind {
            CONSTRUCTOR => Box::new(ConstructorGenerator::new(
                annotation
                    .param("name")
                    .map_or_else(|| format!("New{}", name), str::to_string),
                target,
            )),
            OPTIONAL => Box::new(OptionalGenerator::new(
                annotation
                    .param("name")
                    .map_or_else(|| format!("New{}WithOptions", name), str::to_string),
                target,
            )),
            BUILDER => Box::new(BuilderGenerator::new(
                annotation
                    .param("name")
                    .map_or_else(|| format!("{}Builder", name), str::to_string),
                target,
            )),
            other => {
                return Err(AnnogenError::InvalidOperation(format!(
                    "{} does not handle @{}",
                    self.name(),
                    other
                )))
            }
        };

        self.cache.add_generator(
            node.unit_key(),
            format!("{}:{}", kind, name),
            node.meta.order,
            generator,
        );
        Ok(())
    }

    fn add_post_construct(&self, node: &Node) -> Result<()> {
        let Declaration::Method(method) = &node.declaration else {
            return Err(AnnogenError::InvalidOperation(format!(
                "@{} reached {} which is not a method",
                POST_CONSTRUCT,
                node.name()
            )));
        };

        if !method.params.is_empty() || !(method.results.is_empty() || method.returns_only_error())
        {
            return Err(AnnogenError::generator(
                POST_CONSTRUCT,
                format!(
                    "{}.{} must take no arguments and return nothing or error",
                    method.receiver, method.name
                ),
            ));
        }

        debug!(
            "PostConstruct {}.{} registered for {}",
            method.receiver,
            method.name,
            node.unit_key()
        );
        self.cache.add_post_construct_hook(
            node.unit_key(),
            method.receiver.clone(),
            PostConstructHook {
                method: method.name.clone(),
                returns_error: method.returns_only_error(),
                order: node.meta.order,
            },
        );
        Ok(())
    }
}

impl Processor for ConstructorProcessor {
    fn name(&self) -> &str {
        "Constructor"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn required_shape(&self, kind: &str) -> DeclarationShape {
        if kind == POST_CONSTRUCT {
            DeclarationShape::Method
        } else {
            DeclarationShape::Struct
        }
    }

    fn process(&self, kind: &str, node: &Node, annotations: &[&Annotation]) -> Result<()> {
        match kind {
            POST_CONSTRUCT => self.add_post_construct(node),
            _ => {
                let Some(annotation) = annotations.first() else {
                    return Ok(());
                };
                self.add_struct_generator(kind, node, annotation)
            }
        }
    }

    fn output(&self) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
        self.cache.finalize(&self.file_name)
    }
}
