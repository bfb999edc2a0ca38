//! Shared fakes and fixtures for the core integration suites.

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;
