pub mod rpc;

pub use rpc::{handle_rpc, health};
