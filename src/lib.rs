pub mod artifact;
pub mod bot;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod liveness;
pub mod mesh_io;
pub mod ops;
pub mod render;
pub mod session;
mod triangulation;
