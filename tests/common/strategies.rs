use proptest::prelude::*;

/// Distinct, non-empty entity ids.
pub fn id_list_strategy() -> impl Strategy<Value = Vec<String>> {
    (1usize..60).prop_map(|len| (0..len).map(|i| format!("entity-{i}")).collect())
}

pub fn batch_limit_strategy() -> impl Strategy<Value = usize> {
    1usize..16
}

pub fn filter_key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z]{0,11}".prop_filter("entity_type is reserved", |k| k != "entity_type")
}

pub fn selector_ids_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Za-z0-9-]{1,10}", 1..5)
}
