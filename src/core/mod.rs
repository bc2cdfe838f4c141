pub mod coord;
pub mod timebase;
