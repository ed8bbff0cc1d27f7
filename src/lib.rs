pub mod catalog;
pub mod cost;
pub mod datatypes;
pub mod error;
pub mod explorer;
pub mod factory;
pub mod memo;
pub mod meta;
pub mod operators;
pub mod optimizer;
pub mod properties;
pub mod util;
#[cfg(test)]
pub mod testing;
#[cfg(test)]
mod tests;
