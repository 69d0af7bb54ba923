use katashiro_projection::{
    AdHocRequest, Error, FieldAccessor, FromRootBindings, Lookup, SceneStore, Value, Wrapper,
};
use katashiro_schema::{Composite, Leaf, Metadata, Node, NodeKind, Registry, Repeated};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Person {
    name: String,
    age: i64,
}

impl Person {
    fn new(name: &str, age: i64) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            age,
        })
    }
}

impl FieldAccessor for Person {
    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(self.name.clone().into()),
            "age" => Some(self.age.into()),
            _ => None,
        }
    }
}

struct Family {
    father: Arc<Person>,
    mother: Arc<Person>,
    children: Vec<Arc<Person>>,
}

impl FieldAccessor for Family {
    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "father" => Some(Arc::clone(&self.father).into()),
            "mother" => Some(Arc::clone(&self.mother).into()),
            "children" => Some(Value::List(
                self.children.iter().map(|c| Value::from(Arc::clone(c))).collect(),
            )),
            _ => None,
        }
    }
}

fn person_schema() -> Composite {
    Composite::new(
        "person",
        vec![
            Leaf::with_metadata("name", Metadata::new().with("doc", "Name")).into(),
            Leaf::new("age").into(),
        ],
        Metadata::new(),
    )
    .unwrap()
}

fn family_schema(reg: &Registry) -> Node {
    reg.declare(person_schema());
    Composite::new(
        "family",
        vec![
            reg.alias("father", "person", Metadata::new()),
            reg.alias("mother", "person", Metadata::new()),
            Repeated::of("children", person_schema()).into(),
        ],
        Metadata::new(),
    )
    .unwrap()
    .into()
}

fn family() -> Arc<Family> {
    Arc::new(Family {
        father: Person::new("bar", 40),
        mother: Person::new("baz", 38),
        children: vec![Person::new("foo", 20), Person::new("qux", 17)],
    })
}

fn isolated() -> Lookup {
    Lookup::in_store(&SceneStore::new(), "test")
}

// ── Field access ─────────────────────────────────────────────────

#[test]
fn person_fields_serialize() {
    let lookup = isolated();
    let person: Node = person_schema().into();
    let wrapper = lookup.project(Person::new("foo", 20), &person).unwrap();

    assert_eq!(wrapper.kind(), NodeKind::Composite);
    let name = wrapper.attr("name").unwrap();
    assert_eq!(name.kind(), NodeKind::Leaf);
    assert_eq!(name.serialize(), "foo");
    assert_eq!(wrapper.attr("age").unwrap().serialize(), "20");
    assert_eq!(name.to_string(), "foo");
}

#[test]
fn field_metadata_lookup_is_optional() {
    let lookup = isolated();
    let wrapper = lookup
        .project(Person::new("foo", 20), &person_schema().into())
        .unwrap();
    let name = wrapper.attr("name").unwrap();
    assert_eq!(name.meta("doc").and_then(|v| v.as_str()), Some("Name"));
    assert!(name.meta("missing").is_none());
}

#[test]
fn serialize_and_deserialize_hooks() {
    let schema: Node = Composite::new(
        "person",
        vec![
            Leaf::with_metadata(
                "age",
                Metadata::new()
                    .with_serializer(|v| format!("{v} years"))
                    .with_deserializer(|v| Value::Int(v.as_i64().unwrap_or_default() * 12)),
            )
            .into(),
            Leaf::new("name").into(),
        ],
        Metadata::new(),
    )
    .unwrap()
    .into();

    let wrapper = isolated().project(Person::new("foo", 20), &schema).unwrap();
    let age = wrapper.attr("age").unwrap();
    let field = age.as_field().unwrap();
    assert_eq!(field.serialize(), "20 years");
    assert_eq!(field.deserialize(), Value::Int(240));

    let name = wrapper.attr("name").unwrap();
    assert_eq!(name.as_field().unwrap().deserialize(), Value::from("foo"));
}

// ── Navigation ───────────────────────────────────────────────────

#[test]
fn family_children_iterate_in_order() {
    let reg = Registry::new();
    let schema = family_schema(&reg);
    let wrapper = isolated().project(family(), &schema).unwrap();

    let children = wrapper.attr("children").unwrap();
    assert_eq!(children.kind(), NodeKind::Repeated);
    let elements = children.elements().unwrap();
    assert_eq!(elements.len(), 2);
    assert!(elements.iter().all(|e| e.kind() == NodeKind::Composite));

    let names: Vec<String> = elements
        .iter()
        .map(|e| e.attr("name").unwrap().serialize())
        .collect();
    assert_eq!(names, vec!["foo", "qux"]);
}

#[test]
fn aliases_resolve_during_navigation() {
    let reg = Registry::new();
    let schema = family_schema(&reg);
    let wrapper = isolated().project(family(), &schema).unwrap();

    let father = wrapper.attr("father").unwrap();
    assert_eq!(father.id(), "father");
    assert_eq!(father.kind(), NodeKind::Composite);
    assert_eq!(father.attr("name").unwrap().serialize(), "bar");
    assert_eq!(wrapper.attr("mother").unwrap().attr("age").unwrap().serialize(), "38");
}

#[test]
fn sequence_element_wrappers_are_stable_across_iterations() {
    let reg = Registry::new();
    let schema = family_schema(&reg);
    let wrapper = isolated().project(family(), &schema).unwrap();
    let children = wrapper.attr("children").unwrap();
    let seq = children.as_sequence().unwrap();

    let first = seq.elements().unwrap();
    let second: Vec<Arc<Wrapper>> = seq.iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(seq.len(), 2);
    assert!(first.iter().zip(&second).all(|(a, b)| Arc::ptr_eq(a, b)));
}

#[test]
fn sequence_of_scalars() {
    struct Tags(Vec<&'static str>);
    impl FieldAccessor for Tags {
        fn get_field(&self, name: &str) -> Option<Value> {
            (name == "tags").then(|| self.0.clone().into())
        }
    }

    let schema: Node = Composite::new(
        "post",
        vec![Repeated::of("tags", Leaf::new("tag")).into()],
        Metadata::new(),
    )
    .unwrap()
    .into();
    let wrapper = isolated().project(Arc::new(Tags(vec!["a", "b"])), &schema).unwrap();
    let tags: Vec<String> = wrapper
        .attr("tags")
        .unwrap()
        .elements()
        .unwrap()
        .iter()
        .map(|t| t.serialize())
        .collect();
    assert_eq!(tags, vec!["a", "b"]);
}

#[test]
fn null_sequence_is_empty_and_scalar_sequence_fails() {
    let lookup = isolated();
    let seq: Node = Repeated::of("people", person_schema()).into();

    let empty = lookup.create_wrapper(Value::Null, &seq).unwrap();
    assert!(empty.as_sequence().unwrap().is_empty());
    assert!(empty.elements().unwrap().is_empty());

    let err = lookup.create_wrapper(Value::Int(3), &seq).unwrap_err();
    assert!(matches!(err, Error::NotIterable { ref schema } if schema == "people"));
}

#[test]
#[allow(deprecated)]
fn index_access_is_a_fallback() {
    let reg = Registry::new();
    let schema = family_schema(&reg);
    let wrapper = isolated().project(family(), &schema).unwrap();
    let children = wrapper.attr("children").unwrap();
    let seq = children.as_sequence().unwrap();

    let second = seq.get(1).unwrap().unwrap();
    assert_eq!(second.attr("name").unwrap().serialize(), "qux");
    assert!(Arc::ptr_eq(&second, &seq.elements().unwrap()[1]));
    assert!(seq.get(5).unwrap().is_none());
}

#[test]
#[allow(deprecated)]
fn index_access_can_be_disabled() {
    let reg = Registry::new();
    let schema = family_schema(&reg);
    let lookup = isolated().with_index_access(false);
    let wrapper = lookup.project(family(), &schema).unwrap();
    let children = wrapper.attr("children").unwrap();

    let err = children.as_sequence().unwrap().get(0).unwrap_err();
    assert!(matches!(err, Error::IndexAccessDisabled { ref schema } if schema == "children"));
}

// ── Memoization ──────────────────────────────────────────────────

#[test]
fn repeated_attr_access_returns_same_wrapper() {
    let wrapper = isolated()
        .project(Person::new("foo", 20), &person_schema().into())
        .unwrap();
    let a = wrapper.attr("name").unwrap();
    let b = wrapper.attr("name").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn two_instances_share_one_resolution() {
    let lookup = isolated();
    let person: Node = person_schema().into();

    let foo = lookup.project(Person::new("foo", 20), &person).unwrap();
    let bar = lookup.project(Person::new("bar", 30), &person).unwrap();
    assert_eq!(foo.attr("name").unwrap().serialize(), "foo");
    assert_eq!(bar.attr("name").unwrap().serialize(), "bar");

    let stats = lookup.scene().stats();
    assert_eq!(stats.resolutions, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.roots, 1);
}

#[test]
fn wrappers_are_not_shared_between_projections() {
    let lookup = isolated();
    let person: Node = person_schema().into();
    let value = Person::new("foo", 20);

    let a = lookup.project(Arc::clone(&value), &person).unwrap();
    let b = lookup.project(value, &person).unwrap();
    assert!(!Arc::ptr_eq(&a.attr("name").unwrap(), &b.attr("name").unwrap()));
}

// ── Scenes ───────────────────────────────────────────────────────

#[test]
fn scenes_are_isolated() {
    let store = SceneStore::new();
    let person: Node = person_schema().into();
    let left = Lookup::in_store(&store, "left");
    let right = Lookup::in_store(&store, "right");

    left.project(Person::new("foo", 20), &person).unwrap().attr("name").unwrap();
    assert_eq!(left.scene().stats().resolutions, 1);
    assert_eq!(right.scene().stats().resolutions, 0);

    right.project(Person::new("foo", 20), &person).unwrap().attr("name").unwrap();
    assert_eq!(right.scene().stats().resolutions, 1);
    assert_eq!(store.names(), vec!["left", "right"]);
}

#[test]
fn lookups_over_the_same_scene_share_its_cache() {
    let store = SceneStore::new();
    let person: Node = person_schema().into();
    let a = Lookup::in_store(&store, "shared");
    let b = Lookup::in_store(&store, "shared");

    a.project(Person::new("foo", 20), &person).unwrap().attr("age").unwrap();
    b.project(Person::new("bar", 30), &person).unwrap().attr("age").unwrap();
    assert!(Arc::ptr_eq(a.scene(), b.scene()));
    assert_eq!(a.scene().stats().resolutions, 1);
}

#[test]
fn one_type_through_two_schemas_does_not_collide() {
    let lookup = isolated();
    let plain: Node = person_schema().into();
    let labelled = bracketed_name_schema("labelled");

    let a = lookup.project(Person::new("foo", 20), &plain).unwrap();
    let b = lookup.project(Person::new("foo", 20), &labelled).unwrap();
    assert_eq!(a.attr("name").unwrap().serialize(), "foo");
    assert_eq!(b.attr("name").unwrap().serialize(), "<foo>");
}

fn bracketed_name_schema(id: &str) -> Node {
    let name = Leaf::with_metadata("name", Metadata::new().with_serializer(|v| format!("<{v}>")));
    Composite::new(id, vec![name.into()], Metadata::new())
        .unwrap()
        .into()
}

#[test]
fn same_id_schemas_with_different_hooks_do_not_collide() {
    let lookup = isolated();
    let plain: Node = person_schema().into();
    let bracketed = bracketed_name_schema("person");

    let a = lookup.project(Person::new("foo", 20), &plain).unwrap();
    assert_eq!(a.attr("name").unwrap().serialize(), "foo");
    let b = lookup.project(Person::new("foo", 20), &bracketed).unwrap();
    assert_eq!(b.attr("name").unwrap().serialize(), "<foo>");
    assert_eq!(lookup.scene().stats().entries, 2);
}

#[test]
fn cut_view_does_not_reuse_the_full_schema() {
    let lookup = isolated();
    let full = person_schema();
    let cut: Node = full.cut(&["age"]).into();
    let full: Node = full.into();

    let whole = lookup.project(Person::new("foo", 20), &full).unwrap();
    assert_eq!(whole.attr("age").unwrap().serialize(), "20");

    let narrowed = lookup.project(Person::new("foo", 20), &cut).unwrap();
    assert_eq!(narrowed.id(), "person");
    let err = narrowed.attr("age").unwrap_err();
    assert!(matches!(
        err,
        Error::UnresolvedAttribute { ref attribute, ref schema }
            if attribute == "age" && schema == "person"
    ));
    assert_eq!(narrowed.attr("name").unwrap().serialize(), "foo");
}

#[test]
fn cut_view_resolved_first_does_not_hide_the_full_schema() {
    let lookup = isolated();
    let full = person_schema();
    let cut: Node = full.cut(&["age"]).into();
    let full: Node = full.into();

    let narrowed = lookup.project(Person::new("foo", 20), &cut).unwrap();
    assert!(narrowed.attr("age").is_err());
    let whole = lookup.project(Person::new("foo", 20), &full).unwrap();
    assert_eq!(whole.attr("age").unwrap().serialize(), "20");
}

// ── Failures ─────────────────────────────────────────────────────

#[test]
fn undeclared_attribute_is_unresolved() {
    let wrapper = isolated()
        .project(Person::new("foo", 20), &person_schema().cut(&["age"]).into())
        .unwrap();
    let err = wrapper.attr("age").unwrap_err();
    assert!(matches!(
        err,
        Error::UnresolvedAttribute { ref attribute, ref schema }
            if attribute == "age" && schema == "person"
    ));
    assert!(err.to_string().contains("age"));
}

#[test]
fn failed_resolutions_are_not_cached() {
    let lookup = isolated();
    let wrapper = lookup
        .project(Person::new("foo", 20), &person_schema().cut(&["age"]).into())
        .unwrap();
    assert!(wrapper.attr("age").is_err());
    assert!(wrapper.attr("age").is_err());
    let stats = lookup.scene().stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.hits, 0);
}

#[test]
fn declared_field_missing_on_value() {
    let schema: Node = person_schema().and(Leaf::new("email")).unwrap().into();
    let wrapper = isolated().project(Person::new("foo", 20), &schema).unwrap();
    let err = wrapper.attr("email").unwrap_err();
    assert!(matches!(
        err,
        Error::MissingValue { ref attribute, ref type_name }
            if attribute == "email" && type_name == "Person"
    ));
}

#[test]
fn attr_on_scalar_value_fails() {
    let wrapper = isolated().project(42, &person_schema().into()).unwrap();
    assert!(matches!(wrapper.attr("name"), Err(Error::NotAnObject { .. })));
}

#[test]
fn attr_on_field_is_not_a_model() {
    let wrapper = isolated()
        .project(Person::new("foo", 20), &person_schema().into())
        .unwrap();
    let name = wrapper.attr("name").unwrap();
    assert!(matches!(name.attr("x"), Err(Error::NotAModel { ref schema }) if schema == "name"));
    assert!(matches!(name.elements(), Err(Error::NotIterable { .. })));
}

#[test]
fn unresolvable_alias_surfaces_schema_error() {
    let reg = Registry::new();
    let schema: Node = Composite::new(
        "family",
        vec![reg.alias("father", "nobody", Metadata::new())],
        Metadata::new(),
    )
    .unwrap()
    .into();
    let wrapper = isolated().project(family(), &schema).unwrap();
    assert!(matches!(wrapper.attr("father"), Err(Error::Schema(_))));
}

// ── Ad hoc construction ──────────────────────────────────────────

#[test]
fn ad_hoc_hook_builds_undeclared_fields_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let lookup = isolated().with_ad_hoc(move |req: &AdHocRequest<'_>| -> katashiro_projection::Result<Node> {
        counter.fetch_add(1, Ordering::SeqCst);
        assert_eq!(req.parent.id(), "empty");
        assert!(req.value.is_some());
        Ok(Leaf::with_metadata(req.attribute, Metadata::new().with("adhoc", true)).into())
    });
    let schema: Node = Composite::empty("empty").into();

    let a = lookup.project(Person::new("foo", 20), &schema).unwrap();
    let b = lookup.project(Person::new("bar", 30), &schema).unwrap();
    assert_eq!(a.attr("name").unwrap().serialize(), "foo");
    assert_eq!(b.attr("name").unwrap().serialize(), "bar");
    assert!(b.attr("name").unwrap().meta("adhoc").is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn root_bindings_resolve_undeclared_objects() {
    let store = SceneStore::new();
    let lookup = Lookup::in_store(&store, "roots").with_ad_hoc(FromRootBindings);
    let person: Node = person_schema().into();
    lookup.project(Person::new("someone", 1), &person).unwrap();

    let wrapper = lookup
        .project(family(), &Composite::empty("family").into())
        .unwrap();
    let father = wrapper.attr("father").unwrap();
    assert_eq!(father.id(), "father");
    assert_eq!(father.attr("name").unwrap().serialize(), "bar");

    let err = wrapper.attr("children").unwrap_err();
    assert!(matches!(err, Error::UnresolvedAttribute { .. }));
}

#[test]
fn root_bindings_keep_the_first_schema() {
    let lookup = isolated().with_ad_hoc(FromRootBindings);
    lookup.project(Person::new("someone", 1), &person_schema().into()).unwrap();
    lookup.project(Person::new("someone", 1), &bracketed_name_schema("labelled")).unwrap();

    let wrapper = lookup
        .project(family(), &Composite::empty("family").into())
        .unwrap();
    let father = wrapper.attr("father").unwrap();
    assert_eq!(father.attr("name").unwrap().serialize(), "bar");
    assert!(father.attr("age").is_ok());
}

// ── JSON input ───────────────────────────────────────────────────

#[test]
fn json_values_project_like_objects() {
    let reg = Registry::new();
    let schema = family_schema(&reg);
    let value = Value::from(serde_json::json!({
        "father": {"name": "bar", "age": 40},
        "mother": {"name": "baz", "age": 38},
        "children": [{"name": "foo", "age": 20}, {"name": "qux", "age": 17}],
    }));

    let wrapper = isolated().project(value, &schema).unwrap();
    assert_eq!(wrapper.attr("father").unwrap().attr("name").unwrap().serialize(), "bar");
    let ages: Vec<String> = wrapper
        .attr("children")
        .unwrap()
        .elements()
        .unwrap()
        .iter()
        .map(|c| c.attr("age").unwrap().serialize())
        .collect();
    assert_eq!(ages, vec!["20", "17"]);
}

// ── Concurrency ──────────────────────────────────────────────────

#[test]
fn concurrent_projection_shares_one_cache_entry() {
    let lookup = isolated();
    let person: Node = person_schema().into();

    let names: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let lookup = lookup.clone();
                let person = person.clone();
                s.spawn(move || {
                    let w = lookup.project(Person::new(&format!("p{i}"), i), &person).unwrap();
                    w.attr("name").unwrap().serialize()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(names.len(), 8);
    assert!(names.iter().enumerate().all(|(i, n)| n == &format!("p{i}")));
    let stats = lookup.scene().stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.resolutions + stats.hits, 8);
}

#[test]
fn shared_wrapper_hands_every_thread_the_same_child() {
    let wrapper = isolated()
        .project(Person::new("foo", 20), &person_schema().into())
        .unwrap();

    let children: Vec<Arc<Wrapper>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let wrapper = Arc::clone(&wrapper);
                s.spawn(move || wrapper.attr("age").unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let stored = wrapper.attr("age").unwrap();
    assert!(children.iter().all(|c| Arc::ptr_eq(c, &stored)));
}
