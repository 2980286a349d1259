pub mod catalog_reader;
pub mod journal_reader;
pub mod order_writer;
