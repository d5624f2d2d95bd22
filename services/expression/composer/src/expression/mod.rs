pub use parser::{parse, ParseError};

mod parser;
