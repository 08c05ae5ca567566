// Domain layer: records, transport-level types and the transport port.

pub mod model;
pub mod ports;
pub mod resources;
