pub mod database;
pub mod media_tools;
pub mod storage;
