//! Declarative tables over rows of a remote collection.
//!
//! A [`DataTable`] is described by an ordered list of [`Column`]s and optional edit/delete
//! callbacks. Rendering produces a plain [`TableView`] for whatever front end draws it. Deletes
//! are gated by an explicit [`ConfirmState`] machine.

mod column;
mod confirm;
mod table;

pub use column::{format_value, lookup_path, Accessor, Column};
pub use confirm::ConfirmState;
pub use table::{
    ConfirmPrompt, DataTable, RowAction, TableContent, TableOptions, TableRow, TableView,
};
