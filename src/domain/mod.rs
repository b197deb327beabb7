// Domain layer: data model and ports for the external collaborators.

pub mod model;
pub mod ports;
