//! Shared error taxonomy for the pyveil workspace.
pub mod errors;
