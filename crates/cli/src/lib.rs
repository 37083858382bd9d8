//! Command-line front end for pyveil.
pub mod commands;
