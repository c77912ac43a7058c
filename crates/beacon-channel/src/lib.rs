//! Event channel adapters.
//!
//! [`InMemoryEventChannel`] dispatches synchronously inside `publish` and is
//! what the simulated test harness runs on. [`RedisEventChannel`] maps the
//! same exchange/queue model onto Redis Streams consumer groups.

pub mod memory;
pub mod redis;

pub use beacon_core::channel::{Binding, EnvelopeHandler, EventChannel, EventChannelExt};
pub use beacon_core::error::ChannelError;
pub use memory::InMemoryEventChannel;
pub use self::redis::{RedisChannelConfig, RedisEventChannel};
