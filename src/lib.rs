//! Rental handoff backend
//!
//! Booking lifecycle, single-use QR handoff tokens and split-payment
//! settlement for a peer-to-peer rental marketplace.

pub mod auth;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod handoff;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod routes;
pub mod settlement;
pub mod state;
