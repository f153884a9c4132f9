//! Typed identifiers for graph entities.
//!
//! Every entity in the graph carries a prefixed, UUID-backed identifier.
//! The prefix makes IDs self-describing in logs and serialized graphs
//! (`nd_…` is always a node, `cn_…` always a connector), and the newtypes
//! prevent mixing identifier kinds at compile time.
//!
//! # Examples
//!
//! ```
//! use atelier::ids::NodeId;
//!
//! let id = NodeId::fresh();
//! assert!(id.as_str().starts_with("nd_"));
//!
//! // IDs round-trip through serde as plain strings.
//! let json = serde_json::to_string(&id).unwrap();
//! let back: NodeId = serde_json::from_str(&json).unwrap();
//! assert_eq!(id, back);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! typed_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// The prefix every identifier of this kind starts with.
            pub const PREFIX: &'static str = $prefix;

            /// Mint a fresh identifier.
            #[must_use]
            pub fn fresh() -> Self {
                Self(format!("{}{}", $prefix, Uuid::new_v4().simple()))
            }

            /// Wrap an existing raw identifier, e.g. one read from storage.
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// The identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }
    };
}

typed_id!(
    /// Identifier of a [`GraphNode`](crate::node::GraphNode).
    NodeId,
    "nd_"
);
typed_id!(
    /// Identifier of a [`Connector`](crate::connector::Connector).
    ConnectorId,
    "cn_"
);
typed_id!(
    /// Identifier of an [`Artifact`](crate::artifact::Artifact).
    ArtifactId,
    "artf_"
);
typed_id!(
    /// Identifier of an embedded text source.
    SourceId,
    "src_"
);
typed_id!(
    /// Identifier of an uploaded file source.
    FileId,
    "fl_"
);
typed_id!(
    /// Identifier of a tracked multi-step operation.
    OperationId,
    "op_"
);
