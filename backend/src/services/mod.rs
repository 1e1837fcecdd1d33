pub mod csv_export;
pub mod extractor;
pub mod innertube;
pub mod metadata;
pub mod platform;
pub mod scraper;
pub mod tracker;
