pub mod gait;
