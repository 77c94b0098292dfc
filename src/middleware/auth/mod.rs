pub mod access;

pub use access::{AuthorizeLayer, apply};
