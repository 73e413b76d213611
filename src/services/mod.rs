pub mod geo;
pub mod geofence;
pub mod incident_cache;
pub mod incidents;
pub mod locations;
pub mod queue;
pub mod recorder;
pub mod redis_store;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;
