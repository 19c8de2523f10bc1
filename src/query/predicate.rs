use crate::error::QueryError;
use crate::operator::Operator;
use crate::query::{NodeId, Query, QueryMut, QueryRef, QueryTree};
use crate::value::{Map, Value};

/// Callback that populates a freshly created nested node.
pub type GroupFn<'p> = Box<dyn FnOnce(&mut QueryMut<'_>) -> Result<(), QueryError> + 'p>;

/// Read-only handle on an existing node whose content is copied into the
/// query being built.
#[derive(Debug, Clone, Copy)]
pub struct QuerySource<'p> {
    pub(crate) tree: &'p QueryTree,
    pub(crate) node: NodeId,
}

impl<'p> From<&'p Query> for QuerySource<'p> {
    fn from(query: &'p Query) -> Self {
        let view = query.view();
        QuerySource {
            tree: view.tree(),
            node: view.id(),
        }
    }
}

impl<'p> From<QueryRef<'p>> for QuerySource<'p> {
    fn from(view: QueryRef<'p>) -> Self {
        QuerySource {
            tree: view.tree(),
            node: view.id(),
        }
    }
}

/// Value side of a field map entry.
pub enum FieldValue<'p> {
    Value(Value),
    /// The key names a virtual field, populated by the callback
    VirtualField(GroupFn<'p>),
}

impl<'p> FieldValue<'p> {
    pub fn vf<F>(f: F) -> Self
    where
        F: FnOnce(&mut QueryMut<'_>) -> Result<(), QueryError> + 'p,
    {
        FieldValue::VirtualField(Box::new(f))
    }
}

macro_rules! field_value_from {
    ($($t:ty),*) => {
        $(impl<'p> From<$t> for FieldValue<'p> {
            fn from(v: $t) -> Self {
                FieldValue::Value(v.into())
            }
        })*
    };
}

field_value_from!(Value, &str, String, bool, i32, i64, f64, Map, Vec<Value>);

/// How a virtual-field constraint describes its nested query.
pub enum VfSource<'p> {
    Builder(GroupFn<'p>),
    /// AND-chain of `field operator value` tests against each related record
    Fields {
        fields: Vec<(String, Value)>,
        operator: Operator,
    },
    Query(QuerySource<'p>),
    /// Raw value; only an object is accepted and treated like `Fields`
    Value(Value),
}

/// Input of a constraint-adding builder call.
///
/// Tuples convert directly: `("name", "Mark")` tests equality and
/// `("age", Operator::GreaterThan, 30)` uses an explicit operator.
pub enum Predicate<'p> {
    Field {
        field: String,
        operator: Operator,
        value: Value,
    },
    /// One constraint per entry; with an `or` join and several entries they
    /// are grouped into a single AND-chain
    Fields {
        fields: Vec<(String, FieldValue<'p>)>,
        operator: Operator,
    },
    Group(GroupFn<'p>),
    Query(QuerySource<'p>),
    VirtualField {
        name: String,
        is_many: bool,
        source: VfSource<'p>,
    },
}

impl<'p> Predicate<'p> {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::op(field, Operator::Equal, value)
    }

    pub fn op(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Predicate::Field {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// A parenthesized sub-expression built by `f`.
    pub fn group<F>(f: F) -> Self
    where
        F: FnOnce(&mut QueryMut<'_>) -> Result<(), QueryError> + 'p,
    {
        Predicate::Group(Box::new(f))
    }

    pub fn query(source: impl Into<QuerySource<'p>>) -> Self {
        Predicate::Query(source.into())
    }

    pub fn fields<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue<'p>>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::fields_op(fields, Operator::Equal)
    }

    pub fn fields_op<K, V, I>(fields: I, operator: Operator) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue<'p>>,
        I: IntoIterator<Item = (K, V)>,
    {
        Predicate::Fields {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            operator,
        }
    }

    /// Tests the related records of `name` with a nested builder.
    pub fn vf<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(&mut QueryMut<'_>) -> Result<(), QueryError> + 'p,
    {
        Predicate::VirtualField {
            name: name.into(),
            is_many: true,
            source: VfSource::Builder(Box::new(f)),
        }
    }

    /// Like [`Predicate::vf`] for a relation holding a single record.
    pub fn vf_one<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(&mut QueryMut<'_>) -> Result<(), QueryError> + 'p,
    {
        Self::vf(name, f).many(false)
    }

    pub fn vf_fields<K, V, I>(name: impl Into<String>, fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::vf_fields_op(name, fields, Operator::Equal)
    }

    pub fn vf_fields_op<K, V, I>(name: impl Into<String>, fields: I, operator: Operator) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Predicate::VirtualField {
            name: name.into(),
            is_many: true,
            source: VfSource::Fields {
                fields: fields
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
                operator,
            },
        }
    }

    pub fn vf_query(name: impl Into<String>, source: impl Into<QuerySource<'p>>) -> Self {
        Predicate::VirtualField {
            name: name.into(),
            is_many: true,
            source: VfSource::Query(source.into()),
        }
    }

    pub fn vf_value(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::VirtualField {
            name: name.into(),
            is_many: true,
            source: VfSource::Value(value.into()),
        }
    }

    /// Sets whether a virtual-field predicate tests a collection or a single
    /// related record. Other predicates are returned unchanged.
    pub fn many(mut self, many: bool) -> Self {
        if let Predicate::VirtualField { is_many, .. } = &mut self {
            *is_many = many;
        }
        self
    }
}

impl<'p, V: Into<Value>> From<(&str, V)> for Predicate<'p> {
    fn from((field, value): (&str, V)) -> Self {
        Predicate::eq(field, value)
    }
}

impl<'p, V: Into<Value>> From<(&str, Operator, V)> for Predicate<'p> {
    fn from((field, operator, value): (&str, Operator, V)) -> Self {
        Predicate::op(field, operator, value)
    }
}

impl<'p> From<&'p Query> for Predicate<'p> {
    fn from(query: &'p Query) -> Self {
        Predicate::Query(query.into())
    }
}

impl<'p> From<QueryRef<'p>> for Predicate<'p> {
    fn from(view: QueryRef<'p>) -> Self {
        Predicate::Query(view.into())
    }
}
