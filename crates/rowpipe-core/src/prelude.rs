//! Convenient re-exports for downstream crates.

pub use crate::config::PipelineConfig;
pub use crate::error::{Error, Result};
pub use crate::field::{AnalyticalType, Field, FieldDescription, FieldSpec, StorageType};
pub use crate::field_list::{FieldList, FieldRef};
pub use crate::field_map::{FieldMap, RowFieldFilter};
pub use crate::id::NodeId;
pub use crate::record::{record_to_row, row_to_record};
pub use crate::types::{row, Record, Row, Scalar};
