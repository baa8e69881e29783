//! Shared types and pure-logic utilities for the EarnHub rewards ledger.
//! No storage or runtime dependency, so clients and tools can use it too.

mod day;
mod error;
pub mod khqr;
mod money;
mod short_code;

pub use day::DayKey;
pub use error::TypesError;
pub use money::{Money, MONEY_SCALE};
pub use short_code::{ShortCode, SHORT_CODE_ALPHABET, SHORT_CODE_LEN};
