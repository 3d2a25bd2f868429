//! Rendition-Common: shared identifiers, domain types, and errors.
//!
//! This crate is the foundational dependency of the other rendition crates:
//!
//! - **Typed IDs**: integer newtypes for originals, owners, media rows and jobs
//! - **Domain types**: lifecycle enums and the closed [`TranscodeKind`] union
//! - **Error handling**: the unified [`Error`] type and [`Result`] alias
//!
//! # Examples
//!
//! ```
//! use rendition_common::{Error, MediaKind, TranscodeKind};
//!
//! let kind = TranscodeKind::video(480, None).unwrap();
//! assert_eq!(kind.src_kind(), MediaKind::Video);
//!
//! // audio sources can never produce video
//! assert!(matches!(
//!     TranscodeKind::from_parts(MediaKind::Audio, MediaKind::Video, Some(480), None, None),
//!     Err(Error::InvalidInput(_))
//! ));
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
