pub mod compare;
pub mod grade;
pub mod init;
pub mod session;
pub mod skills;
pub mod validate;
