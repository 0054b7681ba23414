//! File discovery and modification tracking

pub mod glob;
pub mod modification;

pub use glob::{FileGlobber, FileSet, GlobWalker};
pub use modification::{ModificationDiff, ModificationMap};
