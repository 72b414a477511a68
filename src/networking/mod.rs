#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Networking: UDP broadcast/multicast + TCP direct/file-transfer
//! transport, handler fan-out, and peer scoring.

pub mod handler;
pub mod peer_score;
pub mod transport;
