//! Hierarchy node names and paths.
//!
//! Every [`Array`](crate::array::Array) and [`Group`](crate::group::Group) has a [`NodeName`] (its name within its parent group)
//! and a [`NodePath`] (its full name from the root group, e.g. `/group/array`).

mod node_name;
mod node_path;

pub use node_name::{NodeName, NodeNameError};
pub use node_path::{NodePath, NodePathError};
