//! Battle pairing
//!
//! Strategy selection by progress count, the pair selector, and the service
//! facade that ties selection and rating together.

pub mod selector;
pub mod service;
pub mod strategy;

pub use selector::{PairSelector, SelectorConfig};
pub use service::{BattleService, ServiceComponents};
pub use strategy::{SelectionStrategy, SpecialSlots};
