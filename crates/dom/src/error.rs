use crate::NodeKey;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("unknown node {0}")]
    UnknownNode(NodeKey),
    #[error("node {0} cannot have children")]
    NotAContainer(NodeKey),
    #[error("node {0} is not an element")]
    NotAnElement(NodeKey),
    #[error("node {0} has no character data")]
    NotCharacterData(NodeKey),
    #[error("inserting {child} under {parent} would create a cycle or misplace a root")]
    HierarchyRequest { parent: NodeKey, child: NodeKey },
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeKey, child: NodeKey },
    #[error("element {0} already hosts a shadow root")]
    ShadowRootExists(NodeKey),
}
