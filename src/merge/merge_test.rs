//! Multi-manager scenarios for the merge engine.

#[cfg(test)]
mod tests {
    use crate::fieldpath::{Operation, OwnershipLedger, Path, PathElement};
    use crate::merge::{ApplyError, MergeEngine, Merged};
    use crate::value::{from_yaml, FieldList, Map, Value};
    use pretty_assertions::assert_eq;

    fn yaml(s: &str) -> Value {
        from_yaml(s).expect("test yaml must parse")
    }

    fn field(names: &[&str]) -> Path {
        Path::from_field_names(names.iter().copied())
    }

    /// Object state threaded through a scenario.
    struct Object {
        engine: MergeEngine,
        state: Merged,
    }

    impl Object {
        fn new() -> Self {
            Object {
                engine: MergeEngine::default(),
                state: Merged {
                    value: Value::Map(Map::new()),
                    ledger: OwnershipLedger::new(),
                },
            }
        }

        fn try_apply(&self, manager: &str, payload: &str, force: bool) -> Result<Merged, ApplyError> {
            self.engine.apply(
                &self.state.value,
                &self.state.ledger,
                manager,
                &yaml(payload),
                force,
            )
        }

        fn apply(&mut self, manager: &str, payload: &str) -> &mut Self {
            self.state = self
                .try_apply(manager, payload, false)
                .unwrap_or_else(|e| panic!("apply by {} failed: {}", manager, e));
            self
        }

        fn force_apply(&mut self, manager: &str, payload: &str) -> &mut Self {
            self.state = self
                .try_apply(manager, payload, true)
                .unwrap_or_else(|e| panic!("forced apply by {} failed: {}", manager, e));
            self
        }

        fn owners(&self, path: &Path) -> Vec<&str> {
            self.state.ledger.owners_of(path).into_iter().collect()
        }
    }

    #[test]
    fn test_idempotent_apply() {
        let mut obj = Object::new();
        obj.apply("manager1", "data: {a: 1, b: [x, y]}");
        let first = obj.state.clone();

        obj.apply("manager1", "data: {a: 1, b: [x, y]}");
        assert_eq!(obj.state, first);
    }

    #[test]
    fn test_conflict_leaves_state_untouched() {
        let mut obj = Object::new();
        obj.apply("manager1", "data: {a: v1}");
        let before = obj.state.clone();

        let Err(ApplyError::Conflicts(conflicts)) = obj.try_apply("manager2", "data: {a: v2}", false) else {
            panic!("expected conflicts");
        };
        let found: Vec<(String, &str)> = conflicts
            .iter()
            .map(|c| (c.path.to_string(), c.owner.as_str()))
            .collect();
        assert_eq!(found, vec![(".data.a".to_string(), "manager1")]);
        assert_eq!(obj.state, before);
    }

    #[test]
    fn test_conflicts_list_every_owner() {
        let mut obj = Object::new();
        obj.apply("manager1", "a: same").apply("manager2", "a: same");

        let Err(ApplyError::Conflicts(conflicts)) = obj.try_apply("manager3", "a: other", false) else {
            panic!("expected conflicts");
        };
        let owners: Vec<&str> = conflicts.iter().map(|c| c.owner.as_str()).collect();
        assert_eq!(owners, vec!["manager1", "manager2"]);
    }

    #[test]
    fn test_same_value_grants_shared_ownership() {
        let mut obj = Object::new();
        obj.apply("manager1", "data: {a: v}").apply("manager2", "data: {a: v}");

        assert_eq!(obj.owners(&field(&["data", "a"])), vec!["manager1", "manager2"]);
        assert_eq!(obj.state.value, yaml("data: {a: v}"));
    }

    #[test]
    fn test_same_nan_grants_shared_ownership() {
        let mut obj = Object::new();
        obj.apply("manager1", "a: .nan").apply("manager2", "a: .nan");
        assert_eq!(obj.owners(&field(&["a"])), vec!["manager1", "manager2"]);

        let before = obj.state.clone();
        obj.apply("manager2", "a: .nan");
        assert_eq!(obj.state, before);
    }

    #[test]
    fn test_force_takeover() {
        let mut obj = Object::new();
        obj.apply("manager1", "data: {a: v1, b: keep}");
        obj.force_apply("manager2", "data: {a: v2}");

        assert_eq!(obj.state.value, yaml("data: {a: v2, b: keep}"));
        assert_eq!(obj.owners(&field(&["data", "a"])), vec!["manager2"]);
        assert!(!obj.state.ledger.owned_by("manager1").has(&field(&["data", "a"])));
        // Containers asserted with the same kind stay shared.
        assert_eq!(obj.owners(&field(&["data"])), vec!["manager1", "manager2"]);
        assert_eq!(obj.owners(&field(&["data", "b"])), vec!["manager1"]);
    }

    #[test]
    fn test_force_kind_change_evicts_subtree() {
        let mut obj = Object::new();
        obj.apply("manager1", "data: {a: 1}\nother: x");
        obj.force_apply("manager2", "data: flat");

        assert_eq!(obj.state.value, yaml("data: flat\nother: x"));
        assert_eq!(obj.state.ledger.owned_by("manager1").paths(), vec![field(&["other"])]);
        assert_eq!(obj.owners(&field(&["data"])), vec!["manager2"]);
    }

    #[test]
    fn test_relinquish_without_delete() {
        let mut obj = Object::new();
        obj.apply("manager1", "data: {a: v, b: 1}").apply("manager2", "data: {a: v}");
        obj.apply("manager1", "data: {b: 1}");

        assert_eq!(obj.state.value, yaml("data: {a: v, b: 1}"));
        assert_eq!(obj.owners(&field(&["data", "a"])), vec!["manager2"]);
    }

    #[test]
    fn test_relinquish_with_delete() {
        let mut obj = Object::new();
        obj.apply("manager1", "data: {a: v, b: 1}");
        obj.apply("manager1", "data: {b: 1}");

        assert_eq!(obj.state.value, yaml("data: {b: 1}"));
        assert!(obj.owners(&field(&["data", "a"])).is_empty());
    }

    #[test]
    fn test_empty_apply_relinquishes_everything() {
        let mut obj = Object::new();
        obj.apply("manager1", "data: {a: v}\nsolo: 1").apply("manager2", "data: {a: v}");
        obj.apply("manager1", "{}");

        assert!(obj.state.ledger.entry_for("manager1").is_none());
        assert_eq!(obj.state.value, yaml("data: {a: v}"));
    }

    #[test]
    fn test_keyed_list_elements() {
        let mut obj = Object::new();
        obj.apply("manager1", "ports: [{name: http, port: 80}]");
        obj.apply("manager2", "ports: [{name: grpc, port: 9000}]");

        assert_eq!(
            obj.state.value,
            yaml("ports: [{name: http, port: 80}, {name: grpc, port: 9000}]")
        );
        let http = field(&["ports"]).with(PathElement::key(FieldList::single("name", Value::from("http"))));
        assert_eq!(obj.owners(&http), vec!["manager1"]);
        assert_eq!(obj.owners(&field(&["ports"])), vec!["manager1", "manager2"]);

        let Err(ApplyError::Conflicts(conflicts)) =
            obj.try_apply("manager2", "ports: [{name: http, port: 8080}]", false)
        else {
            panic!("expected conflict on the http port");
        };
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts.iter().next().unwrap().path, http.with(PathElement::field_name("port")));

        // manager1 dropping its element deletes it; manager2's stays.
        obj.apply("manager1", "{}");
        assert_eq!(obj.state.value, yaml("ports: [{name: grpc, port: 9000}]"));
    }

    #[test]
    fn test_set_list_members_never_conflict() {
        let mut obj = Object::new();
        obj.apply("manager1", "tags: [a, b]").apply("manager2", "tags: [b, c]");
        assert_eq!(obj.state.value, yaml("tags: [a, b, c]"));

        obj.apply("manager1", "tags: []");
        assert_eq!(obj.state.value, yaml("tags: [b, c]"));
    }

    #[test]
    fn test_update_after_apply_then_reapply() {
        let mut obj = Object::new();
        obj.apply("manager1", "data: {a: 1}");
        obj.state = obj
            .engine
            .update(&obj.state.value, &obj.state.ledger, "editor", &yaml("data: {a: 2}"))
            .unwrap();

        assert_eq!(obj.owners(&field(&["data", "a"])), vec!["editor"]);
        let entry = obj.state.ledger.entry_for("editor").unwrap();
        assert_eq!(entry.operation, Operation::Update);

        // The applier asserting its old value now conflicts with the editor.
        let err = obj.try_apply("manager1", "data: {a: 1}", false).unwrap_err();
        assert!(matches!(err, ApplyError::Conflicts(_)));
    }

    #[test]
    fn test_secret_scenario() {
        let mut obj = Object::new();

        // manager1 creates the object.
        obj.apply("manager1", "stringData: {username: admin, password: admin}");
        assert_eq!(obj.owners(&field(&["stringData", "username"])), vec!["manager1"]);
        assert_eq!(obj.owners(&field(&["stringData", "password"])), vec!["manager1"]);

        // manager2 agrees on the shared values and adds its own key.
        obj.apply("manager2", "stringData: {username: admin, password: admin, key: val}");
        assert_eq!(
            obj.owners(&field(&["stringData", "username"])),
            vec!["manager1", "manager2"]
        );
        assert_eq!(obj.owners(&field(&["stringData", "key"])), vec!["manager2"]);

        // Changing the shared username conflicts with manager1.
        let before = obj.state.clone();
        let Err(ApplyError::Conflicts(conflicts)) =
            obj.try_apply("manager2", "stringData: {username: changed}", false)
        else {
            panic!("expected a conflict on username");
        };
        let conflict = conflicts.iter().next().unwrap();
        assert_eq!(conflict.owner, "manager1");
        assert_eq!(conflict.path, field(&["stringData", "username"]));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(obj.state, before);

        // Forcing it hands username to manager2 alone; manager2's relinquished
        // key is deleted, the password manager1 still owns survives.
        obj.force_apply("manager2", "stringData: {username: changed}");
        assert_eq!(obj.owners(&field(&["stringData", "username"])), vec!["manager2"]);
        assert_eq!(obj.owners(&field(&["stringData", "password"])), vec!["manager1"]);
        assert_eq!(
            obj.state.value,
            yaml("stringData: {username: changed, password: admin}")
        );
    }
}
