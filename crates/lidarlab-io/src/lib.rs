#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// NumPy `.npy` reader and writer.
pub mod npy;
