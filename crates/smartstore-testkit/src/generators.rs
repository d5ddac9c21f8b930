//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{json, Value};

use smartstore_core::{IndexSpec, IndexType, StoreName, UserId};

/// Generate a valid store name.
pub fn store_name() -> impl Strategy<Value = StoreName> {
    "[A-Za-z][A-Za-z0-9_-]{0,23}".prop_map(|name| {
        StoreName::new(name).expect("pattern only yields valid names")
    })
}

/// Generate a soup name.
pub fn soup_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_map(String::from)
}

/// Generate an IndexType.
pub fn index_type() -> impl Strategy<Value = IndexType> {
    prop::sample::select(IndexType::ALL.to_vec())
}

/// Generate an index field path, possibly dotted.
pub fn index_path() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,7}(\\.[a-z][a-z0-9]{0,7}){0,2}".prop_map(String::from)
}

/// Generate a single index spec.
pub fn index_spec() -> impl Strategy<Value = IndexSpec> {
    (index_path(), index_type()).prop_map(|(path, index_type)| {
        IndexSpec::new(path, index_type).expect("generated paths are non-empty")
    })
}

/// Generate a non-empty list of index specs.
pub fn index_specs() -> impl Strategy<Value = Vec<IndexSpec>> {
    prop::collection::vec(index_spec(), 1..=4)
}

/// Generate a type name that no IndexType accepts.
pub fn unknown_type_name() -> impl Strategy<Value = String> {
    "[a-z]{1,10}".prop_filter("must not be a known type", |name| {
        name.parse::<IndexType>().is_err()
    })
}

/// Generate a user.
pub fn user_id() -> impl Strategy<Value = UserId> {
    ("00D[0-9A-Za-z]{12}", "005[0-9A-Za-z]{12}").prop_map(|(org, user)| UserId::new(org, user))
}

/// Generate a flat JSON entry with a string key.
pub fn entry() -> impl Strategy<Value = Value> {
    ("[a-z]{1,12}", any::<i32>(), any::<bool>())
        .prop_map(|(key, count, flag)| json!({"key": key, "count": count, "flag": flag}))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_index_specs_survive_json(specs in index_specs()) {
            let json = serde_json::to_value(&specs).unwrap();
            prop_assert_eq!(IndexSpec::list_from_json(&json).unwrap(), specs);
        }

        #[test]
        fn test_unknown_type_is_rejected(path in index_path(), name in unknown_type_name()) {
            prop_assert!(IndexSpec::parse(path, &name).is_err());
        }

        #[test]
        fn test_storage_dir_is_stable(user in user_id()) {
            let dir = user.storage_dir();
            prop_assert_eq!(dir.len(), 32);
            prop_assert_eq!(dir, user.clone().storage_dir());
        }
    }
}
