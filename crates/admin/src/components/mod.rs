//! Reusable UI building blocks.

pub mod data_table;

pub use data_table::{DataTableConfig, Pagination};
