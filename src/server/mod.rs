//! Core server implementation and orchestration

pub mod classic;

pub use classic::ClassicServer;
