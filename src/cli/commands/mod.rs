pub mod config;
pub mod doctor;
pub mod generate;
pub mod init;
pub mod pdf;
