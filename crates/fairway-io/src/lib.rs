//! File I/O, validation, and serialization for the fairway pipeline.

mod domain;
mod error;
mod reader;
mod ship_filter;
mod store;
mod writer;

pub use domain::{ArtifactKind, ReportDataset, RunName};
pub use error::IoError;
pub use reader::ReportReader;
pub use ship_filter::ShipFilterReader;
pub use store::ArtifactStore;
pub use writer::ResultWriter;
