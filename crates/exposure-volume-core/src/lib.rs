pub mod batch;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod error;
pub mod payload;
pub mod report;
pub mod run;
pub mod secrets;
pub mod uploader;
