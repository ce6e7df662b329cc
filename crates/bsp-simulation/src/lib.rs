//! BSP-Simulation: simulated streaming transport and signal sources
//!
//! Provides an in-process publish/subscribe network implementing the
//! `bsp-core` transport traits, plus real-time simulated devices for testing
//! and development.

pub mod network;
pub mod real_time_stream;
pub mod signal_patterns;
pub mod signal_simulator;

pub use network::*;
pub use real_time_stream::*;
pub use signal_patterns::*;
pub use signal_simulator::*;
