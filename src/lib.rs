pub mod error;
pub mod net;
pub mod probe;
pub mod route;
pub mod sim;
pub mod topo;

pub use error::{Error, Result};

#[cfg(test)]
mod test;
