pub mod fetch;
pub mod filter;
pub mod save;
pub mod validation;

pub use fetch::{fetch, FetchResult};
pub use save::{save, SaveResult};
