pub mod frame;
pub mod line;
pub mod point;
