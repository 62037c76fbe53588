//! Cell text normalization.
//!
//! Text pulled out of the bulletin is in *visual* order: right-to-left runs
//! are stored reversed and wrapped cell lines are stored bottom-to-top. This
//! module turns such fragments into logical reading order. Every cell and
//! every header name goes through the same path; nothing here knows which
//! column a fragment came from.

mod bidi;
mod cell;

pub use bidi::{collapse_whitespace, has_rtl, normalize};
pub use cell::join_cell;
