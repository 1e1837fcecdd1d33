pub mod download;
pub mod params;
pub mod scrape;

pub use download::*;
pub use scrape::*;
