//! webstack: LAMP / LEMP provisioning for Ubuntu and Debian hosts.
//!
//! The binary parses flags (or runs the wizard) into an [`request::Operation`]
//! and hands it to [`orchestrator::Orchestrator`] or [`remover::remove`].
//! Everything that touches the host goes through [`system::System`].

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod packages;
pub mod password;
pub mod remover;
pub mod request;
pub mod requirements;
pub mod service;
pub mod signals;
pub mod steps;
pub mod system;
pub mod ui;
pub mod wizard;
