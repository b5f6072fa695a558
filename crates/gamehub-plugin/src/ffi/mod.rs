//! Entry points shared between the host and dynamically loaded packages.

pub mod abi;
