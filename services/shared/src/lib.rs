pub mod constants;
pub mod errors;
pub mod fetched;
pub mod types;

pub use constants::*;
pub use fetched::*;
pub use types::*;
