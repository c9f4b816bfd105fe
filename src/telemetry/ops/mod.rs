pub mod feed;
pub mod browse;
