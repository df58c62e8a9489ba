//! Configuration parsing and validation
//!
//! This module finds and parses `poet.yml` files and turns them into a
//! validated task catalog.

pub mod parse;
pub mod schema;
pub mod types;

pub use parse::{find_config_file, find_config_file_from, load_catalog, load_catalog_auto, parse_catalog};
pub use types::{Catalog, GlobalConfig};
