use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// A string-keyed store of type-erased values with typed lookup. Cursors
/// chain environments lexically through their parents; lookup tries the
/// nearest frame first.
#[derive(Clone, Default)]
pub struct Env {
    vars: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Env {
    pub fn empty() -> Env {
        Env::default()
    }

    pub fn one<T: Any + Send + Sync>(name: impl Into<String>, value: T) -> Env {
        Env::empty().with(name, value)
    }

    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Env {
        self.vars.insert(name.into(), Arc::new(value));
        self
    }

    /// Merge, right-biased: bindings in `other` shadow bindings in `self`.
    pub fn add(&self, other: &Env) -> Env {
        let mut vars = self.vars.clone();
        for (name, value) in &other.vars {
            vars.insert(name.clone(), value.clone());
        }
        Env { vars }
    }

    /// Typed lookup: succeeds only when the stored value is a `T`.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.vars.get(name).and_then(|value| value.downcast_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_tuple("Env").field(&names).finish()
    }
}

impl PartialEq for Env {
    fn eq(&self, other: &Self) -> bool {
        self.vars.len() == other.vars.len()
            && self.vars.iter().all(|(name, value)| {
                other
                    .vars
                    .get(name)
                    .is_some_and(|theirs| Arc::ptr_eq(value, theirs))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup_misses_on_wrong_type() {
        let env = Env::one("limit", 10i64);
        assert_eq!(env.get::<i64>("limit"), Some(&10));
        assert_eq!(env.get::<String>("limit"), None);
        assert_eq!(env.get::<i64>("offset"), None);
    }

    #[test]
    fn add_is_right_biased() {
        let left = Env::one("user", "alice".to_string()).with("limit", 10i64);
        let right = Env::one("limit", 20i64);
        let merged = left.add(&right);
        assert_eq!(merged.get::<i64>("limit"), Some(&20));
        assert_eq!(merged.get::<String>("user").map(String::as_str), Some("alice"));
    }
}
