//! Configuration file formats

pub mod thread;
