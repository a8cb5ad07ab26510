//! 115 cloud storage session / 115云盘会话
//!
//! Login, directory listing, signed download resolution and rapid
//! (hash-based) upload negotiation against the 115 web APIs.

pub mod error;

// Driver modules (point to project root drivers via path attribute) / 驱动模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use drivers::pan115::{Credential, Pan115Config, Pan115Session};
pub use error::{ApiError, ApiErrorKind};
