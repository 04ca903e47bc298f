//! Network (populations and projections) structures and utilities.
pub mod network;
pub mod population;
pub mod projection;
pub mod scaler;
pub mod topology;
