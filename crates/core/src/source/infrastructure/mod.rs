pub mod device_source_opener;
pub mod ffmpeg_camera_source;
pub mod file_static_source;
