//! CSV adapters for the external tabular feeds
//!
//! The historical feed arrives as `date,agent_id,client_id,visit_count,
//! revenue_amount` rows; product sales as `date,client_id,product_code,
//! quantity`. These readers exist for tests and callers that hold files;
//! the pipeline itself only ever sees in-memory slices.

use crate::core::error::Result;
use crate::data::{HistoricalRecord, ProductSale};
use std::io::Read;
use std::path::Path;

/// Read historical activity records from a CSV file with headers.
pub fn read_history_csv<P: AsRef<Path>>(path: P) -> Result<Vec<HistoricalRecord>> {
    let file = std::fs::File::open(path)?;
    read_history(file)
}

/// Read historical activity records from any reader.
pub fn read_history<R: Read>(reader: R) -> Result<Vec<HistoricalRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for row in csv_reader.deserialize() {
        let record: HistoricalRecord = row?;
        records.push(record);
    }
    Ok(records)
}

/// Read product-level sales from a CSV file with headers.
pub fn read_product_sales_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ProductSale>> {
    let file = std::fs::File::open(path)?;
    let mut csv_reader = csv::Reader::from_reader(file);
    let mut sales = Vec::new();
    for row in csv_reader.deserialize() {
        let sale: ProductSale = row?;
        sales.push(sale);
    }
    Ok(sales)
}
