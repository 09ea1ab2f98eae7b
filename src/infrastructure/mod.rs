pub mod mounts;

pub use mounts::setup_mounts;
