#![cfg_attr(doc, warn(missing_docs))]
#![doc = include_str!("../README.md")]

pub mod emu;
pub mod gdb;
pub mod plat;
