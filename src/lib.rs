pub mod capture;
pub mod common;
pub mod gallery;
pub mod server;

pub use capture::CaptureController;
pub use gallery::Gallery;
