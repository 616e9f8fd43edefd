//! aircast — Core library for the unattended broadcast engine.
//!
//! Queueing, playback, persona scheduling, and content selection all
//! live here. The CLI consumes this crate.

pub mod catalog;
pub mod config;
pub mod content;
pub mod controller;
pub mod dj;
pub mod player;
pub mod queue;
pub mod station;
pub mod weather;
