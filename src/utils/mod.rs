//! Small internal data structures.
//!
//! [`Slab`] gives the reactor stable, reusable tokens for its I/O waiters.

mod slab;

pub(crate) use slab::Slab;
