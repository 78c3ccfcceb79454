pub mod daemon;
pub mod init;
pub mod mappings;
pub mod sync;
