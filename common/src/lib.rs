pub mod buffer2;
pub mod log_setup;
pub mod parallel;
pub mod serde;

pub use buffer2::Buffer2;
pub use self::serde::FileFormat;
