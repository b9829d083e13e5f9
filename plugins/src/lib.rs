pub mod executor;
pub mod factory;
pub mod ocr;
pub mod source;
pub mod tools;
