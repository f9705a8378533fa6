pub mod common;
pub mod listing;
pub mod s3;

pub use common::*;
pub use listing::*;
pub use s3::*;
