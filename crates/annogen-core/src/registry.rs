use crate::{AggregateError, AnnogenError, Node, Processor, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Marker kind name plus its cardinality rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSpec {
    pub name: String,
    pub singular: bool,
}

impl KindSpec {
    /// At most one annotation of this kind per declaration.
    pub fn singular(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            singular: true,
        }
    }

    pub fn repeatable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            singular: false,
        }
    }
}

impl From<&str> for KindSpec {
    fn from(name: &str) -> Self {
        KindSpec::singular(name)
    }
}

enum Registration {
    Active(Arc<dyn Processor>),
    /// Recognized but inert; read as a side value by another processor.
    Noop,
}

struct RegisteredKind {
    spec: KindSpec,
    registration: Registration,
}

/// Maps marker kinds to processors. Built once, then shared by reference
/// with every dispatch worker.
#[derive(Default)]
pub struct MarkerRegistry {
    kinds: Vec<RegisteredKind>,
    index: HashMap<String, usize>,
    processors: Vec<Arc<dyn Processor>>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: impl Into<KindSpec>, processor: Arc<dyn Processor>) {
        if !self.processors.iter().any(|p| Arc::ptr_eq(p, &processor)) {
            self.processors.push(processor.clone());
        }
        self.insert(spec.into(), Registration::Active(processor));
    }

    pub fn register_noop(&mut self, spec: impl Into<KindSpec>) {
        self.insert(spec.into(), Registration::Noop);
    }

    fn insert(&mut self, spec: KindSpec, registration: Registration) {
        let kind = RegisteredKind { spec, registration };
        match self.index.get(&kind.spec.name) {
            Some(&slot) => self.kinds[slot] = kind,
            None => {
                self.index.insert(kind.spec.name.clone(), self.kinds.len());
                self.kinds.push(kind);
            }
        }
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    pub fn is_active(&self, kind: &str) -> bool {
        self.index
            .get(kind)
            .map(|&slot| matches!(self.kinds[slot].registration, Registration::Active(_)))
            .unwrap_or(false)
    }

    /// Distinct processors in registration order.
    pub fn processors(&self) -> &[Arc<dyn Processor>] {
        &self.processors
    }

    /// Runs every active kind found on `node` through its processor.
    ///
    /// Failures of independent kinds are collected, not short-circuited.
    pub fn dispatch(&self, node: &Node) -> Result<()> {
        for annotation in &node.annotations {
            if !self.is_registered(&annotation.kind) {
                debug!(
                    "Ignoring unregistered annotation @{} on {}",
                    annotation.kind,
                    node.name()
                );
            }
        }

        let mut errors = AggregateError::new();
        for kind in &self.kinds {
            let Registration::Active(processor) = &kind.registration else {
                continue;
            };

            let found = node.annotations_of(&kind.spec.name);
            if found.is_empty() {
                continue;
            }

            if kind.spec.singular && found.len() > 1 {
                errors.push(AnnogenError::Cardinality {
                    kind: kind.spec.name.clone(),
                    count: found.len(),
                });
                continue;
            }

            let expected = processor.required_shape(&kind.spec.name);
            let actual = node.declaration.shape();
            if expected != actual {
                errors.push(AnnogenError::ShapeMismatch {
                    kind: kind.spec.name.clone(),
                    expected: expected.to_string(),
                    found: actual.to_string(),
                    name: node.name().to_string(),
                });
                continue;
            }

            errors.record(processor.process(&kind.spec.name, node, &found));
        }
        errors.into_result()
    }

    /// Collects every processor's artifacts. Must only be called after all
    /// nodes have been dispatched.
    pub fn output(&self) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
        let mut out = BTreeMap::new();
        let mut errors = AggregateError::new();
        for processor in &self.processors {
            let Some(files) = errors.record(processor.output()) else {
                continue;
            };
            info!(
                "{} {} produced {} file(s)",
                processor.name(),
                processor.version(),
                files.len()
            );
            for (path, data) in files {
                if out.contains_key(&path) {
                    errors.push(AnnogenError::InvalidOperation(format!(
                        "output path {} produced by more than one processor",
                        path.display()
                    )));
                    continue;
                }
                out.insert(path, data);
            }
        }
        errors.into_result()?;
        Ok(out)
    }
}
