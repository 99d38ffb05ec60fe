//! Connections expose tracked frames from a running driver.

pub mod replay;


pub use replay::ReplayConnection;
