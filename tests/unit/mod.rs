//! Unit tests for individual components

mod config_test;
mod error_test;
mod keyword_test;
mod lifecycle_test;
mod storage_test;
