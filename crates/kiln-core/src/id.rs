//! Arena identifiers
//!
//! Handles are plain indices into the arena that issued them. They carry no
//! global counter: every content store and every graph numbers its own slots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an object slot in a content store
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHandle(pub u32);

/// Handle to a node inside one reconstructed graph
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Handle to a (sub-)scope inside one reconstructed graph
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(pub u32);

macro_rules! arena_id {
    ($name:ident) => {
        impl $name {
            pub fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            pub fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

arena_id!(ObjectHandle);
arena_id!(NodeId);
arena_id!(GraphId);

impl GraphId {
    /// The top-level scope of every graph
    pub const ROOT: GraphId = GraphId(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        assert_eq!(NodeId::from_index(7).index(), 7);
        assert_eq!(ObjectHandle::from_index(0), ObjectHandle(0));
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", NodeId(3)), "NodeId(3)");
        assert_eq!(GraphId::ROOT.to_string(), "0");
    }
}
