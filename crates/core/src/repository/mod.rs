pub mod cloud;
pub mod local;
pub mod traits;
