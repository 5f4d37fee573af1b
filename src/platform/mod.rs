// ABOUTME: Platform module for warden
// ABOUTME: Re-exports the Matrix transport and client helpers

pub mod matrix;

pub use crate::matrix_client::{create_client, login};
pub use matrix::MatrixTransport;
