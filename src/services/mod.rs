pub mod direct_upload;
pub mod drivers;
pub mod mount_table;
