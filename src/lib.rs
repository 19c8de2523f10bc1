//! In-memory hierarchical query trees over key/value records.
//!
//! A [`Query`] combines nested AND/OR constraints, field selection,
//! virtual-field sub-queries over related records, conditional directives
//! and runtime variables. It filters records with [`Query::check_record`] and
//! projects them with [`Query::build_result`] or the `get*` family.
//!
//! ```
//! use arbor_query::{Map, Query, QueryBuilder, Value};
//!
//! # fn main() -> Result<(), arbor_query::QueryError> {
//! let mut query = Query::new("Person");
//! query
//!     .where_(("country", "CO"))?
//!     .or_where(("country", "TX"))?
//!     .select("name")?;
//!
//! let record: Value = [("name", "Mark"), ("country", "CO")].into_iter().collect();
//! let vars = Map::new();
//! assert!(query.check_record(&record, &vars)?);
//!
//! let expected: Value = [("name", "Mark")].into_iter().collect();
//! assert_eq!(query.build_result(&vars, &record)?, expected);
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod convert;
pub mod directive;
pub mod document;
pub mod error;
pub mod operator;
pub mod output;
pub mod params;
pub mod query;
pub mod result;
pub mod select;
pub mod siblings;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use args::{Arg, ArgKind, ArgList, Join, KeyValueArg};
pub use directive::Directives;
pub use document::QueryDocument;
pub use error::{ErrorKind, QueryError};
pub use operator::{Operator, Pattern};
pub use output::{to_json, to_json_pretty};
pub use query::{
    FieldValue, NodeId, NodeKind, Predicate, Query, QueryBuilder, QueryMut, QueryRef, QueryTree,
};
pub use result::{Payload, ResponseFormat, ResponseShape};
pub use select::{SelectField, Selection};
pub use value::{Map, Value};
