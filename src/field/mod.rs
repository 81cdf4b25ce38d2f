//! Field registry: named, typed regions of a binary image.
//!
//! A [`FieldDescriptor`] names a class of symbols and carries its behavior
//! (resize, copy, render). Known descriptors live in a shared [`FieldCatalog`];
//! a [`FieldRegistry`] adds descriptors for symbols discovered while parsing.

mod descriptor;
pub mod known;
mod registry;

pub use descriptor::*;
pub use registry::*;
