//! Core IMAP types.

mod flags;
mod response;
mod sequence;

pub use flags::{Flag, StoreMode, flag_list};
pub use response::{Response, ResponseCode, Status, quoted};
pub use sequence::{SeqBound, SequenceSet};
