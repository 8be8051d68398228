// Library exports for maildraft crate
// This allows tests and the binary to use the modules

pub mod attachment;
pub mod completion;
pub mod composer;
pub mod config;
pub mod controller;
pub mod credential_store;
pub mod gmail_client;

// Web form served to the user
pub mod web;
