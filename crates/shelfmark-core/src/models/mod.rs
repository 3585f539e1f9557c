pub mod canonical;
pub mod catalog;
pub mod source;

pub use canonical::*;
pub use catalog::*;
pub use source::*;
