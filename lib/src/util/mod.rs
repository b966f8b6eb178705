pub mod cache;
pub mod compression;
pub mod file;
pub mod obj;
pub mod ptr;
pub mod read;
