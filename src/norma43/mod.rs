//! Norma 43 (AEB Cuaderno 43) bank statement decoding

pub mod fixed_width;
pub mod records;
pub mod statement;

pub use fixed_width::decode_latin1;
pub use records::*;
pub use statement::*;
