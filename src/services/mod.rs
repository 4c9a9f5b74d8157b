pub mod auth;
pub mod discovery;
pub mod processor;
pub mod runner;
pub mod translator;
