use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::proto::ProtoJson;
use crate::query::{Join, Query};
use crate::result::Outcome;
use crate::schema::Schema;

/// One component's interpreter: resolves a root-shaped query (a possibly
/// renamed select) to the proto value of its field against that component's
/// own data model.
#[async_trait]
pub trait ComponentInterpreter {
    async fn run_root_value(&self, query: &Query) -> Outcome<ProtoJson>;

    fn to_boxed_arc<'a>(self) -> Arc<Box<dyn ComponentInterpreter + Send + Sync + 'a>>
    where
        Self: Sized + Send + Sync + 'a,
    {
        Arc::new(Box::new(self))
    }
}

pub type ComponentType = dyn ComponentInterpreter + Send + Sync;

pub type ComponentBoxedArc = Arc<Box<ComponentType>>;

/// A field of an object mapping: either an attribute resolved in place by
/// the owning component, or a hand-off to another component's interpreter.
#[derive(Clone)]
pub enum FieldMapping {
    Attribute { field_name: String },
    Subobject(Subobject),
}

/// The boundary between two components: selecting `field_name` on the
/// mapped type continues in `component`, with `join` transforming the
/// deferred query before hand-off.
#[derive(Clone)]
pub struct Subobject {
    pub field_name: String,
    pub component: ComponentBoxedArc,
    pub join: Join,
}

impl Subobject {
    pub fn new(field_name: impl Into<String>, component: ComponentBoxedArc) -> Subobject {
        Subobject {
            field_name: field_name.into(),
            component,
            join: Join::default(),
        }
    }

    pub fn with_join(mut self, join: Join) -> Subobject {
        self.join = join;
        self
    }
}

pub struct ObjectMapping {
    pub type_name: String,
    pub interpreter: ComponentBoxedArc,
    pub field_mappings: Vec<FieldMapping>,
}

impl ObjectMapping {
    pub fn new(type_name: impl Into<String>, interpreter: ComponentBoxedArc) -> ObjectMapping {
        ObjectMapping {
            type_name: type_name.into(),
            interpreter,
            field_mappings: vec![],
        }
    }

    pub fn with_attribute(mut self, field_name: impl Into<String>) -> ObjectMapping {
        self.field_mappings.push(FieldMapping::Attribute {
            field_name: field_name.into(),
        });
        self
    }

    pub fn with_subobject(mut self, subobject: Subobject) -> ObjectMapping {
        self.field_mappings.push(FieldMapping::Subobject(subobject));
        self
    }
}

/// Object-to-interpreter bindings for one composed engine. Deferral
/// resolution looks components up here by `(type name, field name)`.
pub struct Mapping {
    pub schema: Arc<Schema>,
    pub object_mappings: Vec<ObjectMapping>,
}

impl Mapping {
    pub fn new(schema: Arc<Schema>) -> Mapping {
        Mapping {
            schema,
            object_mappings: vec![],
        }
    }

    pub fn with_object_mapping(mut self, object_mapping: ObjectMapping) -> Mapping {
        self.object_mappings.push(object_mapping);
        self
    }

    /// The first matching object mapping wins, preserving declaration order.
    pub fn object_mapping(&self, type_name: &str) -> Option<&ObjectMapping> {
        self.object_mappings
            .iter()
            .find(|om| om.type_name == type_name)
    }

    pub fn subobject(&self, type_name: &str, field_name: &str) -> Option<&Subobject> {
        self.object_mapping(type_name).and_then(|om| {
            om.field_mappings.iter().find_map(|fm| match fm {
                FieldMapping::Subobject(subobject) if subobject.field_name == field_name => {
                    Some(subobject)
                }
                _ => None,
            })
        })
    }

    /// The interpreter owning the query root type.
    pub fn root_interpreter(&self) -> Option<&ComponentBoxedArc> {
        self.object_mapping(&self.schema.query_type)
            .map(|om| &om.interpreter)
    }
}

impl Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types: Vec<&str> = self
            .object_mappings
            .iter()
            .map(|om| om.type_name.as_str())
            .collect();
        f.debug_struct("Mapping")
            .field("query_type", &self.schema.query_type)
            .field("object_mappings", &types)
            .finish()
    }
}
