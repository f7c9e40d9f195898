use crate::NodeKey;

/// One observed change, in the order it happened.
///
/// Records describe what happened, not the final state: by the time they are
/// drained the document may have moved on, and consumers are expected to read
/// the current state back from the document.
#[derive(Clone, Debug, PartialEq)]
pub enum MutationRecord {
    ChildList {
        target: NodeKey,
        added: Vec<NodeKey>,
        removed: Vec<NodeKey>,
        previous_sibling: Option<NodeKey>,
        next_sibling: Option<NodeKey>,
    },
    Attributes {
        target: NodeKey,
        name: String,
        old_value: Option<String>,
    },
    CharacterData {
        target: NodeKey,
        old_value: String,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeKey {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::Attributes { target, .. }
            | MutationRecord::CharacterData { target, .. } => *target,
        }
    }
}
