mod client;

pub use client::{Client, ClientTx, Config, ConfigBuilder, Stats, connect, connect_with_config};
pub use interview_types as types;
