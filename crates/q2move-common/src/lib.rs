#![allow(clippy::too_many_arguments, clippy::needless_range_loop, clippy::float_cmp,
         clippy::manual_range_contains, clippy::comparison_chain,
         clippy::field_reassign_with_default, clippy::new_without_default)]

pub mod q_shared;
pub mod qfiles;
pub mod error;
pub mod common;
pub mod cvar;
pub mod bspfile;
pub mod entstring;
pub mod entity;
pub mod cmodel;
pub mod pmove;

#[cfg(any(test, feature = "test-util"))]
pub mod testmap;
