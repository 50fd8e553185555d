#[macro_use]
mod id;
mod data;
mod item;

pub use data::Arena;
pub use id::{Id, Identifier};
