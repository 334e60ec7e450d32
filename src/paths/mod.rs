//! Path Controller (C6): Device→Path mapping on the media server.

pub mod controller;

pub use controller::{path_name_for, PathController};
