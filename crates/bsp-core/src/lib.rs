//! BSP-Core: Foundation types for biosignal acquisition
//!
//! Stream descriptors, the merged output record, the error taxonomy and the
//! transport traits every acquisition backend implements.

pub mod descriptor;
pub mod error;
pub mod record;
pub mod transport;

pub use descriptor::*;
pub use error::{BspError, BspResult};
pub use record::*;
pub use transport::{MarkerInlet, SampleInlet, StreamDiscovery, StreamPredicate};
