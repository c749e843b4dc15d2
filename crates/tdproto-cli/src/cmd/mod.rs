pub mod bridge;
pub mod decode;
pub mod tags;
