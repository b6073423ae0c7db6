pub mod media_tools;
pub mod pipeline;
pub mod storage;
pub mod thumbnail_service;
pub mod video_service;
