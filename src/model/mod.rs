//! Data model shared by the extraction pipeline.
//!
//! Raw types ([`RawTable`], [`RawRow`], [`Page`]) carry cell text exactly as
//! the page geometry produced it. Normalized types ([`Schema`], [`Record`],
//! [`Recordset`]) carry logical-order strings ready for export.

mod document;
mod page;
mod record;
mod table;

pub use document::Metadata;
pub use page::Page;
pub use record::{Record, Recordset, Schema};
pub use table::{RawRow, RawTable};
