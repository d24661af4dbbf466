//! Desktop host for the SceneSwap renderer.
//!
//! Drives a [`sceneswap::Compositor`] from a synthetic tracking session in a
//! winit window, with an egui panel standing in for the app's controls.

pub mod app;
pub mod config;
pub mod synthetic;
pub mod ui;
