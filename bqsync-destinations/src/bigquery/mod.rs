mod client;
mod core;
mod encoding;

pub use client::{BigQueryClient, BigQueryDatasetId, BigQueryProjectId, BigQueryTableId};
pub use core::BigQueryWarehouse;
pub use encoding::{build_delete_statement, cell_to_json, cell_to_query_parameter};
