//! Property: structurally equal `{kind, config}` pairs share a
//! fingerprint; any difference in kind or config separates them.

use proptest::prelude::*;
use serde_json::{json, Value};

use a2e_resilience::ResultCache;

fn config_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-z/]{0,12}".prop_map(Value::from),
    ];
    proptest::collection::btree_map("[a-z]{1,6}", leaf, 0..5)
        .prop_map(|map| json!(map))
}

proptest! {
    #[test]
    fn equal_inputs_share_a_fingerprint(config in config_strategy()) {
        let a = ResultCache::fingerprint("ApiCall", &config);
        let b = ResultCache::fingerprint("ApiCall", &config.clone());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn kind_difference_separates_fingerprints(config in config_strategy()) {
        let a = ResultCache::fingerprint("ApiCall", &config);
        let b = ResultCache::fingerprint("FilterData", &config);
        prop_assert_ne!(a, b);
    }

    #[test]
    fn config_difference_separates_fingerprints(
        config in config_strategy(),
        extra in "[a-z]{1,6}",
    ) {
        let mut changed = config.clone();
        let map = changed.as_object_mut().unwrap();
        // Force a structural difference whatever the base map held.
        let marker = map.get("zz-marker").cloned();
        map.insert("zz-marker".into(), json!(format!("{extra}-changed")));
        prop_assume!(marker != map.get("zz-marker").cloned());

        let a = ResultCache::fingerprint("ApiCall", &config);
        let b = ResultCache::fingerprint("ApiCall", &changed);
        prop_assert_ne!(a, b);
    }
}
