mod env;
pub mod path;

pub use env::*;
pub use starbase_styles::*;
