pub mod discovery;
pub mod gate;
pub mod traits;
pub mod v4l2_backend;
