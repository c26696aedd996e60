pub mod adapter;
#[cfg(test)]
pub mod mock;
pub mod transport;

pub use adapter::BluerTransport;
pub use transport::{CharacteristicAddress, GattTransport};
