//! Boolean conditions evaluated against an item.
//!
//! The `when` wrapper routes items with Tera expressions over `item`:
//!
//! ```text
//! item.key % 2 != 0
//! item.source is match(".*\.md$") and not item.draft
//! "python" in item.tags
//! item["published"] >= "2024-01-01"
//! ```
//!
//! Each expression is compiled once into an `{% if %}` template. On top of
//! Tera's own tests and filters, `match` checks a string against a regular
//! expression anchored at its start, written `value is match("re")` or
//! `value | match(pattern="re")`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::error::Error as _;
use std::sync::{Arc, Mutex};

use regex::Regex;
use serde_json::Value;
use tera::{Context, Tera};

use crate::item::Item;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("syntax error in '{expression}': {message}")]
    Syntax { expression: String, message: String },

    #[error("cannot evaluate '{expression}': {message}")]
    Evaluation { expression: String, message: String },
}

/// A set of conditions that must all hold, compiled once and evaluated per
/// item.
pub struct Conditions {
    tera: Tera,
    expressions: Vec<String>,
}

impl Conditions {
    pub fn compile(expressions: &[String]) -> Result<Self, ConditionError> {
        let mut tera = Tera::default();
        let matcher = Matcher::default();
        tera.register_tester("match", matcher.clone());
        tera.register_filter("match", matcher);

        for (index, expression) in expressions.iter().enumerate() {
            let template = format!("{{% if {expression} %}}1{{% endif %}}");
            tera.add_raw_template(&template_name(index), &template)
                .map_err(|e| ConditionError::Syntax {
                    expression: expression.clone(),
                    message: describe(&e),
                })?;
        }

        Ok(Self {
            tera,
            expressions: expressions.to_vec(),
        })
    }

    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }

    /// True when every condition holds. Stops at the first that does not.
    pub fn evaluate(&self, item: &Item) -> Result<bool, ConditionError> {
        if self.expressions.is_empty() {
            return Ok(true);
        }

        let mut context = Context::new();
        context.insert("item", &item.as_mapping());

        for (index, expression) in self.expressions.iter().enumerate() {
            let rendered = self
                .tera
                .render(&template_name(index), &context)
                .map_err(|e| ConditionError::Evaluation {
                    expression: expression.clone(),
                    message: describe(&e),
                })?;
            if rendered.is_empty() {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn template_name(index: usize) -> String {
    format!("when[{index}]")
}

/// Tera errors keep the useful detail in their source chain.
fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// The `match` test and filter. Patterns are compiled on first use.
#[derive(Clone, Default)]
struct Matcher {
    compiled: Arc<Mutex<HashMap<String, Regex>>>,
}

impl Matcher {
    fn is_match(&self, subject: Option<&Value>, pattern: Option<&Value>) -> tera::Result<bool> {
        let Some(Value::String(pattern)) = pattern else {
            return Err(tera::Error::msg("`match` expects a string pattern"));
        };
        let Some(Value::String(subject)) = subject else {
            return Ok(false);
        };

        let mut compiled = self
            .compiled
            .lock()
            .map_err(|_| tera::Error::msg("pattern cache poisoned"))?;
        let regex = match compiled.entry(pattern.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
                    tera::Error::msg(format!("invalid pattern \"{pattern}\": {e}"))
                })?;
                entry.insert(regex)
            }
        };
        Ok(regex.is_match(subject))
    }
}

impl tera::Test for Matcher {
    fn test(&self, value: Option<&Value>, args: &[Value]) -> tera::Result<bool> {
        self.is_match(value, args.first())
    }
}

impl tera::Filter for Matcher {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        self.is_match(Some(value), args.get("pattern")).map(Value::Bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> Item {
        match json!({
            "key": 3,
            "title": "Hello",
            "source": "posts/2024/hello.md",
            "tags": ["rust", "web"],
            "meta": {"draft": false, "rank": [10, 20]},
        }) {
            Value::Object(fields) => Item::from_map(fields),
            _ => unreachable!(),
        }
    }

    fn compile(expression: &str) -> Result<Conditions, ConditionError> {
        Conditions::compile(&[expression.to_string()])
    }

    fn check(expression: &str) -> bool {
        compile(expression).unwrap().evaluate(&item()).unwrap()
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        assert!(check("item.key % 2 != 0"));
        assert!(!check("item.key % 2 == 0"));
        assert!(check("item.key * 2 + 1 == 7"));
        assert!(check("item.key / 2 == 1.5"));
        assert!(check("item.title == \"Hello\""));
    }

    #[test]
    fn test_attribute_and_index_access() {
        assert!(check("item[\"title\"] == \"Hello\""));
        assert!(check("item.meta.rank.1 == 20"));
        assert!(check("not item.meta.draft"));
        assert!(check("item.key is defined"));
        assert!(!check("item.missing is defined"));
    }

    #[test]
    fn test_membership_and_logic() {
        assert!(check("\"rust\" in item.tags"));
        assert!(!check("\"go\" in item.tags"));
        assert!(check("\"ell\" in item.title and item.key > 1"));
        assert!(check("item.key > 10 or item.title == \"Hello\""));
    }

    #[test]
    fn test_match_is_anchored() {
        assert!(check(r#"item.source is match(".*\.md$")"#));
        assert!(check(r#"item.source is match("posts/")"#));
        assert!(!check(r#"item.source is match("hello")"#));
        assert!(check(r#"item.source | match(pattern="posts/\d+")"#));
        assert!(!check(r#"item.key is match(".*")"#));
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let expressions = vec!["item.key > 1".to_string(), "item.key > 5".to_string()];
        let conditions = Conditions::compile(&expressions).unwrap();
        assert!(!conditions.evaluate(&item()).unwrap());
        assert_eq!(conditions.expressions(), expressions.as_slice());

        assert!(Conditions::compile(&[]).unwrap().evaluate(&item()).unwrap());
    }

    #[test]
    fn test_syntax_errors() {
        let err = compile("item.key ==").err().unwrap();
        assert!(matches!(err, ConditionError::Syntax { .. }));
        assert!(err.to_string().starts_with("syntax error in 'item.key =='"));
        assert!(compile("(item.key").is_err());
        assert!(compile("\"open").is_err());
    }

    #[test]
    fn test_evaluation_errors() {
        let conditions = compile("item.key % 0 == 1").unwrap();
        let err = conditions.evaluate(&item()).unwrap_err();
        assert!(matches!(err, ConditionError::Evaluation { .. }));
        assert!(err.to_string().contains("item.key % 0 == 1"));

        let conditions = compile(r#"item.source is match("(")"#).unwrap();
        let err = conditions.evaluate(&item()).unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn test_extreme_integers_do_not_panic() {
        assert!(check("1 % 9223372036854775807 == 1"));

        let min = Item::new().with("key", i64::MIN).unwrap();
        assert!(compile("item.key < 0").unwrap().evaluate(&min).unwrap());
        assert!(compile("item.key % 2 == 0").unwrap().evaluate(&min).unwrap());
        assert!(!compile("item.key % 3 == 1").unwrap().evaluate(&min).unwrap());
    }
}
