pub mod frame;
pub mod gate;
pub mod rect;
pub mod scheduler;
pub mod snapshot;

pub use scheduler::CaptureController;
