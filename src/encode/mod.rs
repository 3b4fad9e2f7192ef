pub mod export;
pub mod ffmpeg;
pub mod sink;
