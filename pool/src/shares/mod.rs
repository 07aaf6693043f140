/// Mining shares module
///
/// Share validation, block submission and accounting persistence

pub mod hasher;
pub mod outcome;
pub mod storage;
pub mod submitter;
pub mod types;
pub mod validator;

pub use hasher::{HasherFactory, HasherRegistry, RegistryError};
pub use outcome::{Outcome, RejectReason};
pub use storage::{AccountingSink, BlockRecord, RedisStorage, ShareRecord};
pub use submitter::BlockSubmitter;
pub use types::{SubmissionParseError, SubmittedWork};
pub use validator::ShareValidator;
