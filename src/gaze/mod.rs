pub mod aversion;
pub mod behavior;
pub mod condition;
pub mod motion;
pub mod orchestrator;
pub mod perception;
pub mod sink;
