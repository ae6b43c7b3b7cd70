pub mod api;
pub mod auth;
pub mod bot;
pub mod cli;
pub mod credentials;
pub mod logging;
pub mod proxmox;
pub mod settings;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod tests;
