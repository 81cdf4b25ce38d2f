//! Conversion stages applied to a target layout.
//!
//! # Conversion Pipeline
//!
//! A conversion runs these stages on the target layout, in order:
//!
//! 1. **Image Merge** - Loads the input image over the target's symbols
//! 2. **Field Transfer** - Takes field values over from a source layout
//! 3. **Overrides** - Applies `name=hexbytes` directives
//! 4. **Post-Processing** - Verifies and updates the checksum field
//!
//! Each stage is a free function taking the [`ConversionContext`], so stages
//! can be run on their own or skipped.

mod checksum;
mod context;
mod overrides;
mod post_process;
mod transfer;

pub use checksum::*;
pub use context::*;
pub use overrides::*;
pub use post_process::*;
pub use transfer::*;
