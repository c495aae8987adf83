//! rusty-ceres: viewer for pre-computed asteroid light curves.
//!
//! The archive publishes one FITS file per (asteroid, array, frequency)
//! combination under a deterministic object key; see [`archive`] for the
//! naming convention and [`data`] for the file layout.

pub mod app;
pub mod archive;
pub mod color;
pub mod data;
pub mod state;
pub mod ui;
