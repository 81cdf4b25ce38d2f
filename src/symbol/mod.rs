//! Symbol maps, symbol lists and layouts.
//!
//! A symbol map (normally an ELF file) supplies the content of one data
//! section and a symbol table. [`materialize`] binds each symbol in that
//! section to a field descriptor and produces a [`Layout`]: the section
//! content as an owned blob plus the list of typed [`Symbol`]s within it.

mod elf;
mod layout;
mod list;
mod materialize;
mod source;

pub use elf::*;
pub use layout::*;
pub use list::*;
pub use materialize::*;
pub use source::*;
