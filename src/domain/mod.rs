//! Domain layer: types shared by every other layer.
//!
//! # Organization
//!
//! - [`error`]: Error type and result alias
//! - [`theme`]: Light/dark theme preference
//!
//! # Examples
//!
//! ```
//! use pageshell::domain::{Result, Theme};
//!
//! fn parse(name: &str) -> Result<Theme> {
//!     name.parse()
//! }
//!
//! assert_eq!(parse("dark")?, Theme::Dark);
//! # Ok::<(), pageshell::PageShellError>(())
//! ```

pub mod error;
pub mod theme;

pub use error::{PageShellError, Result};
pub use theme::Theme;
