//! Domain layer: the order model, its status machine, the verification artifact
//! and the ports the application layer talks through.

pub mod artifact;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;
pub mod status;
