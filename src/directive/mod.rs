//! Conditional-inclusion directives attached to queries and select fields.
//!
//! A directive is a name with an argument mapping, e.g. `skip { if: true }`.
//! Arguments may be bound to variables (`{ if: ":hideEmail" }`); a bound
//! argument records the variable name and a default that applies when the
//! variables map does not carry the variable.
//!
//! Only `skip` and `include` affect projection. Both have a built-in default
//! for their `if` argument (`false` for `skip`, `true` for `include`); every
//! other variable-bound argument must be given a default explicitly.

pub mod merge;

use indexmap::IndexMap;

use crate::error::QueryError;
use crate::params::value_param;
use crate::value::{Map, Value};

pub const SKIP: &str = "skip";
pub const INCLUDE: &str = "include";
const IF: &str = "if";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    directives: IndexMap<String, Map>,
    /// directive name -> argument key -> variable name
    variables: IndexMap<String, IndexMap<String, String>>,
    /// directive name -> argument key -> default value
    defaults: IndexMap<String, Map>,
}

fn builtin_default(directive: &str, argument: &str) -> Option<Value> {
    match (directive, argument) {
        (SKIP, IF) => Some(Value::Boolean(false)),
        (INCLUDE, IF) => Some(Value::Boolean(true)),
        _ => None,
    }
}

impl Directives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Arguments of the directive `name`.
    pub fn get(&self, name: &str) -> Option<&Map> {
        self.directives.get(name)
    }

    /// Variable bound to argument `key` of directive `name`.
    pub fn variable(&self, name: &str, key: &str) -> Option<&str> {
        self.variables.get(name)?.get(key).map(String::as_str)
    }

    pub fn default_value(&self, name: &str, key: &str) -> Option<&Value> {
        self.defaults.get(name)?.get(key)
    }

    /// All variable names referenced by any directive argument.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables
            .values()
            .flat_map(|bindings| bindings.values().map(String::as_str))
    }

    /// Adds (or merges into) the directive `name`.
    ///
    /// Returns whether any argument was bound to a variable. Nothing is
    /// modified when an error is returned.
    pub fn add(
        &mut self,
        name: &str,
        args: Map,
        arg_defaults: Option<&Map>,
    ) -> Result<bool, QueryError> {
        let mut bound = Vec::new();
        for (key, arg) in &args {
            let Some(var) = value_param(arg) else {
                continue;
            };
            let default = arg_defaults
                .and_then(|d| d.get(key).cloned())
                .or_else(|| builtin_default(name, key))
                .ok_or_else(|| QueryError::MissingDirectiveDefault {
                    directive: name.to_string(),
                    argument: key.clone(),
                })?;
            bound.push((key.clone(), var.to_string(), default));
        }

        let has_variables = !bound.is_empty();
        let directive = self.directives.entry(name.to_string()).or_default();
        for (key, arg) in args {
            if bound.iter().any(|(k, ..)| *k == key) {
                // a variable replaces the whole argument, it is never merged
                directive.insert(key, arg);
                continue;
            }
            if let Some(vars) = self.variables.get_mut(name)
                && vars.shift_remove(&key).is_some()
            {
                // the old value is a variable reference, not something to merge into
                directive.shift_remove(&key);
                if let Some(defaults) = self.defaults.get_mut(name) {
                    defaults.shift_remove(&key);
                }
            }
            match directive.get_mut(&key) {
                Some(existing) => merge::merge_value(existing, &arg),
                None => {
                    directive.insert(key, arg);
                }
            }
        }
        for (key, var, default) in bound {
            self.variables
                .entry(name.to_string())
                .or_default()
                .insert(key.clone(), var);
            self.defaults
                .entry(name.to_string())
                .or_default()
                .insert(key, default);
        }
        self.variables.retain(|_, vars| !vars.is_empty());
        self.defaults.retain(|_, defaults| !defaults.is_empty());
        Ok(has_variables)
    }

    /// Resolves whether the owner should be part of the output.
    ///
    /// `skip` wins over `include`; with neither present the owner is included.
    pub fn should_include(&self, variables: &Map) -> bool {
        if self.directives.contains_key(SKIP) {
            return !self.resolve(SKIP, IF, variables).as_bool();
        }
        if self.directives.contains_key(INCLUDE) {
            return self.resolve(INCLUDE, IF, variables).as_bool();
        }
        true
    }

    fn resolve(&self, name: &str, key: &str, variables: &Map) -> Value {
        if let Some(var) = self.variable(name, key) {
            if let Some(v) = variables.get(var) {
                return v.clone();
            }
            if let Some(default) = self.default_value(name, key) {
                return default.clone();
            }
        }
        self.get(name)
            .and_then(|args| args.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Merges another directive set into this one.
    ///
    /// Each directive is deep-merged with `other` winning on conflicts. A
    /// variable binding in `other` replaces this side's binding and default
    /// for that argument; a literal argument in `other` drops it.
    pub fn merge(&mut self, other: &Directives) {
        for (name, args) in &other.directives {
            let directive = self.directives.entry(name.clone()).or_default();
            for (key, arg) in args {
                match other.variable(name, key) {
                    Some(var) => {
                        directive.insert(key.clone(), arg.clone());
                        self.variables
                            .entry(name.clone())
                            .or_default()
                            .insert(key.clone(), var.to_string());
                        if let Some(default) = other.default_value(name, key) {
                            self.defaults
                                .entry(name.clone())
                                .or_default()
                                .insert(key.clone(), default.clone());
                        }
                    }
                    None => {
                        if let Some(vars) = self.variables.get_mut(name)
                            && vars.shift_remove(key).is_some()
                        {
                            directive.shift_remove(key);
                            if let Some(defaults) = self.defaults.get_mut(name) {
                                defaults.shift_remove(key);
                            }
                        }
                        match directive.get_mut(key) {
                            Some(existing) => merge::merge_value(existing, arg),
                            None => {
                                directive.insert(key.clone(), arg.clone());
                            }
                        }
                    }
                }
            }
        }
        self.variables.retain(|_, vars| !vars.is_empty());
        self.defaults.retain(|_, defaults| !defaults.is_empty());
    }

    /// Stores patched values for every bound variable present in `data`.
    pub fn update_variables(&self, data: &Map, variables: &mut Map) {
        for var in self.variable_names() {
            if let Some(value) = data.get(var)
                && value.is_truthy()
            {
                variables.insert(var.to_string(), value.clone());
            }
        }
    }
}
