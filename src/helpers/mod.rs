//! Low-level plumbing shared by the readers: byte sources, zip parts and
//! streaming XML.
pub(crate) mod reader;
pub(crate) mod xml;
pub(crate) mod zip;
