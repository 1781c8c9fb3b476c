#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod assets;
pub mod cli;
pub mod color;
pub mod geometry;
pub mod io;
pub mod ops;
pub mod scene;
pub mod session;
pub mod settings;
pub mod surface;
