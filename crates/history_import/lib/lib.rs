pub mod build_info;
pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod elastic;
pub mod import;
pub mod logging;
pub mod source;
pub mod window;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;
