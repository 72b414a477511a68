#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Key-at-rest storage, rate limiting and audit logging for the signing key.

pub mod keystore;
