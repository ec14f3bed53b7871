#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use lidarlab_io as io;

#[doc(inline)]
pub use lidarlab_3d as k3d;
