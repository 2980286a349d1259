use crate::domain::payment::CatalogItem;
use crate::error::{BookingError, Result};
use std::io::Read;

/// Reads workshop catalog rows (`reference, title, price, currency, bookable`).
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes catalog items. Prices must be positive and currency
    /// codes three letters; rows that are not fail individually.
    pub fn items(self) -> impl Iterator<Item = Result<CatalogItem>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BookingError::from))
    }
}
