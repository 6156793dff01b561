use crate::{Annotation, DeclarationShape, Node, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Consumer of one or more marker kinds.
///
/// `process` runs during dispatch, possibly on several worker threads at once,
/// and must only record work. `output` runs once after every node has been
/// dispatched and returns the generated artifacts keyed by output path.
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Declaration shape that annotations of `kind` must be attached to.
    fn required_shape(&self, kind: &str) -> DeclarationShape;

    fn process(&self, kind: &str, node: &Node, annotations: &[&Annotation]) -> Result<()>;

    fn output(&self) -> Result<BTreeMap<PathBuf, Vec<u8>>>;
}
