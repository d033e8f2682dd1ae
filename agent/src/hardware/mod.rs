pub mod camera;
pub mod power;
pub mod probe;
