pub mod paths;
pub mod wide;
