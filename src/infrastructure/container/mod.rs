//! Container module

mod definition;
mod identity;
mod injectable;
mod store;

pub use definition::Definition;
pub use identity::Identity;
pub use injectable::{Injectable, Instance, Resolved, TypeDescriptor};
pub use store::{Container, ContainerStats};
