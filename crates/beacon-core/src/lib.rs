//! Core types and ports shared by the url-management and analytics services.
//!
//! Nothing in this crate talks to a database or a broker. Adapters live in
//! `beacon-storage` and `beacon-channel`; services depend only on the traits
//! defined here.

pub mod channel;
pub mod error;
pub mod event;
pub mod generator;
pub mod model;
pub mod repository;
pub mod shortcode;

pub use channel::{Binding, EnvelopeHandler, EventChannel, EventChannelExt, EventHandler};
pub use error::{ChannelError, HandlerError, InvalidShortCode, StorageError};
pub use event::{DomainEvent, EventEnvelope, UrlAccessedEvent};
pub use generator::{Generator, Sha256Generator};
pub use model::{NewUrlMapping, UrlAccessStats, UrlMapping};
pub use repository::{AccessCounterStore, AccessCounterTx, UrlMappingStore, UrlMappingTx};
pub use shortcode::ShortCode;
