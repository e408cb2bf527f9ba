pub mod atomic;
pub mod image_spool;

pub use image_spool::FsImageSpool;
