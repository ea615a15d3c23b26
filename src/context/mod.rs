pub mod assembler;

pub use assembler::Assembler;
