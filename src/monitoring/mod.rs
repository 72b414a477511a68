#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Observability: Prometheus metrics registry.

pub mod metrics;
