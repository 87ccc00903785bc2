#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![cfg_attr(feature = "fail-on-warnings", deny(clippy::all))]

pub mod account;
pub mod batch;
pub mod currency;
pub mod date_dim;
pub mod fact;
pub mod field;
pub mod loan;
pub mod primitives;
pub mod sink;
pub mod staging;
pub mod store;
pub mod summary;
mod warehouse;

pub use warehouse::*;

pub use batch::{BatchReport, BatchStats, BatchStatus};
pub use primitives::*;
