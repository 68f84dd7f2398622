pub mod captured_frame;

pub use captured_frame::*;
