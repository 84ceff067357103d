//! Core module: the byte cursor every wire value goes through

mod buffer;

pub use buffer::Buffer;
