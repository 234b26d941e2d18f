//! Master/Worker IPC fabric: newline-delimited JSON over a Unix domain
//! socket (a named pipe on Windows), server side (C7) and client side (C8).

pub mod client;
pub mod codec;
pub mod server;
pub mod wire;

pub use client::IpcClient;
pub use server::{IpcServer, RequestHandler};
pub use wire::{Outcome, Request, Response, WireError};
