//! Batch ingress: CSV catalog and journal readers, the journal replayer and the
//! order report writer used by the binary.

pub mod csv;
pub mod replay;
