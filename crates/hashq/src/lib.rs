#![doc = include_str!("../README.md")]

mod coordinator;
mod drain;
mod error;
mod id;
mod sequence;
mod stats;
mod store;
mod transform;

pub use crate::coordinator::*;
pub use crate::drain::*;
pub use crate::error::*;
pub use crate::id::*;
pub use crate::sequence::*;
pub use crate::stats::*;
pub use crate::store::*;
pub use crate::transform::*;
