pub mod logger;
pub mod temp;
