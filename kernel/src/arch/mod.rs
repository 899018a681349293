pub mod traits;

#[cfg(all(target_arch = "aarch64", feature = "aarch64_arch"))]
pub mod aarch64;

#[cfg(all(target_arch = "aarch64", feature = "aarch64_arch"))]
pub use self::aarch64::*;
