mod error;
pub use error::*;

mod message;
pub use message::*;

mod combine;
pub use combine::*;

mod aggregate;
pub use aggregate::*;

mod format;
pub use format::*;

mod incoming;
pub use incoming::*;

mod outgoing;
pub use outgoing::*;

mod partition;
pub use partition::*;

mod network;
pub use network::*;

mod vertex;
pub use vertex::*;

mod graph;
pub use graph::*;

mod context;
pub use context::*;

mod algorithm;
pub use algorithm::*;

mod state;
pub use state::*;

mod worker;
pub use worker::*;

mod conductor;
pub use conductor::*;

mod config;
pub use config::*;

pub mod algos;
