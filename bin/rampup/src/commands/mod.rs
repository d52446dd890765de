pub mod chat;
pub mod ingest;
pub mod init;
pub mod sessions;
pub mod status;
