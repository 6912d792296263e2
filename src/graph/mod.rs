pub mod node;
pub mod registry;
pub mod resolver;

pub use node::{NodeId, NodeKind, NodeState, TrackedNode};
pub use registry::DependencyGraph;
pub use resolver::Resolver;
