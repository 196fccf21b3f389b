pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod ledger;
pub mod ogr;
pub mod output;
pub mod report;
pub mod workspace;
