pub mod assembler;
pub mod loader;
pub mod pager;

pub use assembler::*;
pub use loader::*;
pub use pager::*;
