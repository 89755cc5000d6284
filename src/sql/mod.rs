pub mod builder;
pub mod params;

pub use builder::{count, insert, select, update, QueryBuf};
pub use params::BindValue;
