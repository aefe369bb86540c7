//! # scb
//! Command-line statechart compiler. The heavy lifting lives in [`scb_core`].

pub mod cli;

pub use scb_core;
