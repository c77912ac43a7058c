mod counter;
mod mapping;

pub use counter::InMemoryAccessCounterStore;
pub use mapping::InMemoryUrlMappingStore;
