use std::sync::Arc;

use crate::schema::{Schema, Type, TYPENAME_FIELD};

/// The position a cursor occupies: the schema field names from the root to
/// here (innermost first), the same path with query aliases applied, and
/// the GraphQL type at this position. Both paths always have equal length.
#[derive(Clone, Debug)]
pub struct Context {
    pub schema: Arc<Schema>,
    pub path: Vec<String>,
    pub result_path: Vec<String>,
    pub tpe: Type,
}

impl Context {
    pub fn root(schema: Arc<Schema>, tpe: Type) -> Context {
        Context {
            schema,
            path: vec![],
            result_path: vec![],
            tpe,
        }
    }

    /// Same position, viewed at a different type.
    pub fn as_type(&self, tpe: Type) -> Context {
        Context {
            schema: self.schema.clone(),
            path: self.path.clone(),
            result_path: self.result_path.clone(),
            tpe,
        }
    }

    /// Step into a declared field, applying `result_name` to the alias path.
    /// `None` when the field is not declared on the current type.
    pub fn for_field(&self, field_name: &str, result_name: Option<&str>) -> Option<Context> {
        let tpe = if field_name == TYPENAME_FIELD {
            self.schema.named("String")?
        } else {
            self.schema.field_type(&self.tpe, field_name)?
        };
        Some(self.step(field_name, result_name, tpe))
    }

    /// Step into a field, falling back to the synthetic attribute scalar for
    /// mapping-level pseudo-fields not declared in the schema.
    pub fn for_field_or_attribute(&self, field_name: &str, result_name: Option<&str>) -> Context {
        match self.for_field(field_name, result_name) {
            Some(context) => context,
            None => self.step(field_name, result_name, Type::attribute()),
        }
    }

    pub fn for_path(&self, names: &[&str]) -> Option<Context> {
        names
            .iter()
            .try_fold(self.clone(), |context, name| context.for_field(name, None))
    }

    /// The response path of this position, outermost first, as rendered in
    /// problem entries.
    pub fn problem_path(&self) -> Vec<String> {
        self.result_path.iter().rev().cloned().collect()
    }

    fn step(&self, field_name: &str, result_name: Option<&str>, tpe: Type) -> Context {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.push(field_name.to_string());
        path.extend(self.path.iter().cloned());
        let mut result_path = Vec::with_capacity(self.result_path.len() + 1);
        result_path.push(result_name.unwrap_or(field_name).to_string());
        result_path.extend(self.result_path.iter().cloned());
        Context {
            schema: self.schema.clone(),
            path,
            result_path,
            tpe,
        }
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.result_path == other.result_path
            && self.tpe == other.tpe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Outcome;

    fn schema() -> Arc<Schema> {
        match crate::schema::from_sdl(
            r#"
            type Query { movie: Movie }
            type Movie { id: ID! title: String! }
            "#,
        ) {
            Outcome::Success(schema) => schema,
            other => panic!("unexpected problems: {:?}", other.problems()),
        }
    }

    #[test]
    fn paths_stay_in_lockstep() {
        let schema = schema();
        let root = Context::root(schema.clone(), schema.query_type().unwrap());
        let movie = root.for_field("movie", Some("film")).unwrap();
        let title = movie.for_field("title", None).unwrap();

        assert_eq!(title.path, vec!["title", "movie"]);
        assert_eq!(title.result_path, vec!["title", "film"]);
        assert_eq!(title.path.len(), title.result_path.len());
        assert_eq!(title.problem_path(), vec!["film", "title"]);
    }

    #[test]
    fn unknown_field_is_none_but_attribute_falls_back() {
        let schema = schema();
        let root = Context::root(schema.clone(), schema.query_type().unwrap());
        let movie = root.for_field("movie", None).unwrap();
        assert!(movie.for_field("nope", None).is_none());

        let attr = movie.for_field_or_attribute("nope", None);
        assert_eq!(attr.tpe.underlying().name(), crate::schema::ATTRIBUTE_TYPE);
        assert!(attr.tpe.is_nullable());
    }

    #[test]
    fn typename_is_a_string_everywhere() {
        let schema = schema();
        let root = Context::root(schema.clone(), schema.query_type().unwrap());
        let movie = root.for_field("movie", None).unwrap();
        let tn = movie.for_field(TYPENAME_FIELD, None).unwrap();
        assert_eq!(tn.tpe.underlying().name(), "String");
    }
}
