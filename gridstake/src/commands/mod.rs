// Copyright (c) 2024 Gridstake Developers

//! CLI command implementations.
//!
//! These modules implement the user-facing CLI commands and legitimately
//! use stdout for output.

#![allow(clippy::print_stdout)]

pub mod config_init;
pub mod config_show;
