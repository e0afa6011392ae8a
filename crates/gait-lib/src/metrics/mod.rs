pub mod gait;
pub mod quality;
