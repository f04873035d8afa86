pub mod connection;

pub use connection::{GatewayContext, handle_connection};
