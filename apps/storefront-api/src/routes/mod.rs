//! Route handlers, one module per resource.

pub mod cart;
pub mod health;
pub mod orders;
pub mod payments;
