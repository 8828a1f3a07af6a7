//! Query DSL and compiler.

mod compiler;
mod request;
mod tree;

pub use compiler::*;
pub use request::*;
pub use tree::{PathNode, PathTree};
