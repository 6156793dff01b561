pub mod file_collect;
pub mod language;
pub mod markers;
pub mod module;
pub mod scan;
pub mod sniffer;

pub use file_collect::*;
pub use language::*;
pub use markers::*;
pub use module::*;
pub use scan::*;
pub use sniffer::*;
