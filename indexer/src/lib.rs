pub mod ingest;
pub mod markup;
