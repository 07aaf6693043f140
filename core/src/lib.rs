//! ETC pool core library
//!
//! Chain fork schedules, difficulty/target arithmetic and Etchash
//! light verification shared by the pool service.

pub mod algorithms;
pub mod consensus;
pub mod network;

pub use algorithms::{Etchash, PowHasher, WorkCandidate};
pub use network::{Chain, ForkSchedule};
