//! Blocking transport plumbing: frame accumulation and the drivers that
//! pump the connection sequence and the CredSSP legs.

#[macro_use]
extern crate tracing;

mod connector;
mod credssp;
mod framed;

pub use connector::*;
pub use credssp::*;
pub use framed::*;
