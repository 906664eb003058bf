//! Issuance of Brazilian electronic invoices (NF-e model 55, NFC-e model 65).
//!
//! Drafts are validated, taxed and numbered locally; signing and transmission
//! to SEFAZ happen in an external Fiscal Gateway reached through [`gateway`].

#[macro_use]
mod macros;

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod fiscal;
pub mod gateway;
pub mod models;
pub mod repository;
pub mod schema;
pub mod services;
pub mod utils;
