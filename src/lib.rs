//! Browser-driven attendance scraper for the NSIT IMS student portal.
//!
//! The portal has no API: attendance lives behind a CAPTCHA login and a
//! legacy frameset UI. This crate drives a real Chrome session through the
//! login flow, parks it while a human transcribes the CAPTCHA, then resumes
//! to navigate the menus and scrape the attendance table.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod portal;
pub mod session;
pub mod state;
pub mod web;
