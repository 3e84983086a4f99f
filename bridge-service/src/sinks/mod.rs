pub mod dsmr_reader;

pub use dsmr_reader::DsmrReaderSink;
