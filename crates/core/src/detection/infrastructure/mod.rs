pub mod cascade_detector;
pub mod cascade_resolver;
pub mod haar_cascade;
