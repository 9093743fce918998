//! Readers for the Linux `/proc` filesystem.
//!
//! `parser` holds the pure text parsers; [`ProcProbe`] reads the files
//! through a [`FileSystem`](crate::collector::FileSystem).

pub mod parser;
mod probe;

pub use parser::ParseError;
pub use probe::ProcProbe;
