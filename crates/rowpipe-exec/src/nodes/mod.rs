//! Concrete node types.
//!
//! Most pipes are the `rowpipe-operators` operators themselves: `PipeNode` is
//! implemented for them here, the operator plans the output fields and
//! produces the stream.

pub mod field;
pub mod record;
pub mod sources;
pub mod targets;

pub use field::FieldMapNode;
pub use record::SelectNode;
pub use sources::{RecordListSource, RowListSource};
pub use targets::{Collected, JsonlTarget, RecordListTarget, RowListTarget};

use crate::node::AttributeDescriptor;

pub(crate) const fn attr(
    name: &'static str,
    label: &'static str,
    description: &'static str,
) -> AttributeDescriptor {
    AttributeDescriptor {
        name,
        label,
        description,
    }
}
