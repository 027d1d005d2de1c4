mod buffer;
mod collator;
mod console;
mod normalizer;

pub use buffer::*;
pub use collator::*;
pub use console::*;
pub use normalizer::*;
