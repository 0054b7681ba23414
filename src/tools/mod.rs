//! External compiler and bundler invocation

pub mod args;
pub mod system;
pub mod trait_def;

pub use args::{bundler_args, compiler_args};
pub use system::ProcessRunner;
pub use trait_def::{ToolOutput, ToolRunner};
