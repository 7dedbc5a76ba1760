pub mod db;
pub mod jobdb;
pub mod notificationdb;
pub mod ratedb;
pub mod taxonomydb;
pub mod userdb;

#[cfg(test)]
pub mod memory;

pub use db::{DBClient, Store};
