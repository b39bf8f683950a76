#![allow(clippy::new_without_default, clippy::float_cmp, clippy::needless_range_loop)]

pub mod files;
pub mod cl_timing;
pub mod cl_runtimer;
pub mod cl_spawn;
pub mod cl_world;
pub mod cl_pred;
