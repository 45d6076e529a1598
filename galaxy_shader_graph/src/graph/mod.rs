//! Declared graph module
//!
//! Node descriptions, the commit protocol and the declared tree the
//! front-end builds through commits.

mod node;
mod commit;
mod declared_tree;

pub use node::{NodeId, PassFlags, PassDesc, AliasDesc, AliasBinding, NodeDesc};
pub use commit::Commit;
pub use declared_tree::{DeclaredTree, AppliedCommit, NodeKind, PassKey, AliasKey};
