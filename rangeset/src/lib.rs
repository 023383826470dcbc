//! Compressed ordered sets of `u32` values.
//!
//! The collection stores runs of consecutive values rather than the values
//! themselves, so memory use follows the shape of the data, not its size.
//! All set algebra works directly on runs as well, which makes combining
//! sets that cover millions of values as cheap as combining a handful of
//! intervals. Typical consumers track selected rows of a list model or
//! dirty regions of an index space.

pub mod iter;
pub mod run;
pub mod set;

pub use iter::{RangeSetIter, Values};
pub use run::Run;
pub use set::RangeSet;
