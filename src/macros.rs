//! Attribute-list syntax.
//!
//! Purely syntactic sugar over `(name, Value)` pairs accepted by
//! `Class::create`, `Class::search`, `Class::find` and
//! `Instance::set_many`.

/// Builds a `Vec<(String, Value)>` from `name: value` pairs.
///
/// Names that are not Rust identifiers (e.g. `"2nd"`) use the
/// `"name" => value` form.
///
/// # Examples
///
/// ```
/// use dynstore::{Store, StoreConfig, Value, attrs};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Store::open(StoreConfig::in_memory())?;
/// let items = store.class("Item")?;
///
/// let lamp = items.create(attrs! { label: "lamp", weight: 2.5 })?;
/// lamp.set_many(attrs! { "2nd_label" => "light" })?;
///
/// let found = items.find(attrs! { label: "lamp" })?;
/// assert_eq!(found.get("2nd_label"), Some(Value::from("light")));
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::Value)>::new()
    };
    ($($name:ident : $value:expr),+ $(,)?) => {
        ::std::vec![
            $((::std::string::String::from(stringify!($name)), $crate::Value::from($value))),+
        ]
    };
    ($($name:literal => $value:expr),+ $(,)?) => {
        ::std::vec![
            $((::std::string::String::from($name), $crate::Value::from($value))),+
        ]
    };
}

#[cfg(test)]
mod tests {
    use crate::Value;

    #[test]
    fn test_ident_form() {
        let list = attrs! { color: "red", size: 3 };
        assert_eq!(
            list,
            vec![
                ("color".to_string(), Value::from("red")),
                ("size".to_string(), Value::Integer(3)),
            ]
        );
    }

    #[test]
    fn test_literal_form_and_empty() {
        let list = attrs! { "2nd" => 1.5, "x" => None::<i64> };
        assert_eq!(list[0], ("2nd".to_string(), Value::Float(1.5)));
        assert_eq!(list[1].1, Value::Null);
        assert!(attrs! {}.is_empty());
    }
}
