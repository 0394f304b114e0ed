// file: src/parser/mod.rs
// description: filename parsing and process grouping

pub mod filename;
pub mod grouper;
pub mod patterns;

pub use filename::{canonicalize_cnj, normalize_filename, parse};
pub use grouper::{group, select_principal};
