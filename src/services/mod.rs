pub mod parser;
pub mod pipeline;
pub mod timestamp;
pub mod writer;
