pub mod capture;
pub mod error;
pub mod ffmpeg;
#[cfg(feature = "opencv")]
pub mod opencv;
pub mod source;

pub use capture::*;
pub use error::*;
pub use source::*;
