pub mod recorder;
pub mod vfs;

pub use recorder::Recorder;
pub use vfs::{Fault, IoCall, Vfs, WANT_ERROR};
