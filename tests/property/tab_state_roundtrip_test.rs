//! Property-based tests for tab state persistence round-trip.
//!
//! These tests verify that for any sequence of registry operations, writing
//! the state and building a fresh registry on the same store yields the same
//! tabs in the same order with the same active tab, with transient loading
//! flags cleared.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use seekshell::database::{KeyValueStore, MemoryStore};
use seekshell::managers::tab_registry::{TabRegistry, TAB_STATE_KEY, TAB_STATE_NAMESPACE};
use seekshell::services::config_service::SharedConfig;

#[derive(Debug, Clone)]
enum TabOp {
    Create(String),
    Close(usize),
    Activate(usize),
    Retitle(usize, String),
}

fn arb_url() -> impl Strategy<Value = String> {
    "[a-z]{1,8}".prop_map(|host| format!("https://{}.example/", host))
}

fn arb_tab_ops() -> impl Strategy<Value = Vec<TabOp>> {
    prop::collection::vec(
        prop_oneof![
            3 => arb_url().prop_map(TabOp::Create),
            1 => (0..10usize).prop_map(TabOp::Close),
            2 => (0..10usize).prop_map(TabOp::Activate),
            1 => (0..10usize, "[A-Za-z0-9 ]{0,16}").prop_map(|(i, t)| TabOp::Retitle(i, t)),
        ],
        0..30,
    )
}

// **Property: Restore round-trip**
//
// *For any* sequence of operations followed by `dispose`, a fresh registry on
// the same store SHALL expose the same tab ids, urls and titles in the same
// order, the same active id, and no tab flagged as loading.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn persisted_state_restores_identically(ops in arb_tab_ops()) {
        let store = Arc::new(MemoryStore::new());
        let registry = TabRegistry::new(store.clone(), SharedConfig::default());

        for op in &ops {
            let current = registry.get_snapshot();
            let pick = |i: usize| current.tabs[i % current.tabs.len()].id.clone();
            match op {
                TabOp::Create(url) => { registry.create_tab(Some(url.as_str())); }
                TabOp::Close(i) => { registry.close_tab(&pick(*i)); }
                TabOp::Activate(i) => { registry.set_active_tab(&pick(*i)); }
                TabOp::Retitle(i, title) => {
                    registry.update_tab_meta(&pick(*i), seekshell::types::tab::TabMetaUpdate {
                        title: Some(title.clone()),
                        ..Default::default()
                    });
                }
            }
        }
        let before = registry.get_snapshot();
        registry.dispose();

        let restored = TabRegistry::new(store, SharedConfig::default()).get_snapshot();

        prop_assert_eq!(restored.len(), before.len());
        for (old, new) in before.tabs.iter().zip(restored.tabs.iter()) {
            prop_assert_eq!(&old.id, &new.id);
            prop_assert_eq!(&old.url, &new.url);
            prop_assert_eq!(&old.title, &new.title);
            prop_assert_eq!(old.is_active, new.is_active);
            prop_assert!(!new.is_loading);
        }
        prop_assert_eq!(restored.active_tab_id, before.active_tab_id);
    }

    #[test]
    fn dangling_active_id_falls_back_to_first_tab(count in 1..8usize, dangling in "[a-z]{4}") {
        let store = MemoryStore::new();
        let tabs: Vec<_> = (0..count)
            .map(|i| json!({
                "id": format!("tab-{}", i),
                "title": "t",
                "url": "https://nodeseek.com/",
                "isActive": i == count - 1,
                "createdAt": i,
                "updatedAt": i,
            }))
            .collect();
        store
            .set(TAB_STATE_NAMESPACE, TAB_STATE_KEY, &json!({"tabs": tabs, "activeTabId": dangling}))
            .unwrap();

        let snapshot = TabRegistry::new(Arc::new(store), SharedConfig::default()).get_snapshot();
        prop_assert_eq!(snapshot.active_tab_id.as_deref(), Some("tab-0"));
        prop_assert_eq!(snapshot.tabs.iter().filter(|t| t.is_active).count(), 1);
    }
}
