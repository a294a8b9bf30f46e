pub mod document;
pub mod relational;
pub mod table;
