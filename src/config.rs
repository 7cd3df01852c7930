//! JSON configuration for the demo tools. Every knob is optional and resolved
//! over the library defaults.

pub mod vp_demo;
