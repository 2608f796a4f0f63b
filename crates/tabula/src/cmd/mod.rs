//! Command implementations for the Tabula CLI

pub mod apply;
pub mod columns;
