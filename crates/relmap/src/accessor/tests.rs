use super::*;

#[derive(Debug, Default, Clone, PartialEq)]
struct Name {
    first: String,
    last: Option<String>,
}

impl Property for Name {
    const RECORD: bool = true;

    fn collect<R: 'static>(
        b: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Self>,
        depth: usize,
    ) -> OrmResult<()> {
        b.record(path, lens.clone(), depth)?;
        String::collect(
            b,
            &join_path(path, "first"),
            lens.field(|n: &Name| &n.first, |n: &mut Name| &mut n.first),
            depth + 1,
        )?;
        Option::<String>::collect(
            b,
            &join_path(path, "last"),
            lens.field(|n: &Name| &n.last, |n: &mut Name| &mut n.last),
            depth + 1,
        )
    }

    fn collect_optional<R: 'static>(
        b: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Option<Self>>,
        depth: usize,
    ) -> OrmResult<()> {
        b.optional_record(path, lens.clone(), depth)?;
        Self::collect(b, path, lens.some(), depth)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Person {
    id: i64,
    name: Name,
    alias: Option<Name>,
}

impl Property for Person {
    const RECORD: bool = true;

    fn collect<R: 'static>(
        b: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Self>,
        depth: usize,
    ) -> OrmResult<()> {
        b.record(path, lens.clone(), depth)?;
        i64::collect(
            b,
            &join_path(path, "id"),
            lens.field(|p: &Person| &p.id, |p: &mut Person| &mut p.id),
            depth + 1,
        )?;
        Name::collect(
            b,
            &join_path(path, "name"),
            lens.field(|p: &Person| &p.name, |p: &mut Person| &mut p.name),
            depth + 1,
        )?;
        Option::<Name>::collect(
            b,
            &join_path(path, "alias"),
            lens.field(|p: &Person| &p.alias, |p: &mut Person| &mut p.alias),
            depth + 1,
        )
    }

    fn collect_optional<R: 'static>(
        b: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Option<Self>>,
        depth: usize,
    ) -> OrmResult<()> {
        b.optional_record(path, lens.clone(), depth)?;
        Self::collect(b, path, lens.some(), depth)
    }
}

#[derive(Default)]
struct Chain {
    value: i32,
    next: Box<Chain>,
}

impl Property for Chain {
    const RECORD: bool = true;

    fn collect<R: 'static>(
        b: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Self>,
        depth: usize,
    ) -> OrmResult<()> {
        b.record(path, lens.clone(), depth)?;
        i32::collect(
            b,
            &join_path(path, "value"),
            lens.field(|c: &Chain| &c.value, |c: &mut Chain| &mut c.value),
            depth + 1,
        )?;
        Box::<Chain>::collect(
            b,
            &join_path(path, "next"),
            lens.field(|c: &Chain| &c.next, |c: &mut Chain| &mut c.next),
            depth + 1,
        )
    }

    fn collect_optional<R: 'static>(
        b: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Option<Self>>,
        depth: usize,
    ) -> OrmResult<()> {
        Self::collect(b, path, lens.some(), depth)
    }
}

#[test]
fn flattens_nested_records_in_declaration_order() {
    let accessor = Accessor::<Person>::of().unwrap();
    assert_eq!(
        accessor.value_paths(),
        ["id", "name.first", "name.last", "alias.first", "alias.last"]
    );
    assert_eq!(
        accessor.property("alias").map(|p| p.kind),
        Some(PropertyKind::Record { optional: true })
    );
    assert_eq!(
        accessor.property("name.last").map(|p| p.kind),
        Some(PropertyKind::Value {
            value_type: TypeKey::of::<String>(),
            nullable: true
        })
    );
}

#[test]
fn accessor_is_cached_per_type() {
    let a = Accessor::<Person>::of().unwrap();
    let b = Accessor::<Person>::of().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn get_and_set_nested_paths() {
    let accessor = Accessor::<Person>::of().unwrap();
    let mut p = Person::default();

    accessor
        .set_value(&mut p, "name.first", Some(Value::new("Akane".to_string())))
        .unwrap();
    // i32 converts into the i64 field.
    accessor.set_value(&mut p, "id", Some(Value::new(7_i32))).unwrap();

    assert_eq!(p.name.first, "Akane");
    assert_eq!(p.id, 7);
    assert_eq!(
        accessor.get_value(&p, "name.first").unwrap(),
        Some(Value::new("Akane".to_string()))
    );
    assert_eq!(accessor.get_value(&p, "name.last").unwrap(), None);
}

#[test]
fn null_on_non_optional_scalar_is_ignored() {
    let accessor = Accessor::<Person>::of().unwrap();
    let mut p = Person {
        id: 3,
        ..Person::default()
    };
    accessor.set_value(&mut p, "id", None).unwrap();
    assert_eq!(p.id, 3);
}

#[test]
fn unknown_path_is_an_error() {
    let accessor = Accessor::<Person>::of().unwrap();
    let err = accessor.get_value(&Person::default(), "nope").unwrap_err();
    assert!(matches!(err, OrmError::PropertyNotFound { .. }));
}

#[test]
fn absent_intermediate_is_a_no_op_until_materialized() {
    let accessor = Accessor::<Person>::of().unwrap();
    let mut p = Person::default();

    assert_eq!(accessor.get_value(&p, "alias.first").unwrap(), None);
    accessor
        .set_value(&mut p, "alias.first", Some(Value::new("Bo".to_string())))
        .unwrap();
    assert!(p.alias.is_none());

    accessor.materialize(&mut p, "alias.first");
    accessor
        .set_value(&mut p, "alias.first", Some(Value::new("Bo".to_string())))
        .unwrap();
    assert_eq!(p.alias.as_ref().map(|n| n.first.as_str()), Some("Bo"));
}

#[test]
fn conversion_failure_surfaces_from_setter() {
    let accessor = Accessor::<Person>::of().unwrap();
    let mut p = Person::default();
    let err = accessor
        .set_value(&mut p, "id", Some(Value::new("abc".to_string())))
        .unwrap_err();
    assert!(err.is_conversion());
}

#[test]
fn recursive_records_exceed_the_depth_limit() {
    let err = Accessor::<Chain>::of().err().unwrap();
    assert!(matches!(err, OrmError::Config(_)));
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Leaf {
    value: i32,
}

impl Property for Leaf {
    const RECORD: bool = true;

    fn collect<R: 'static>(
        b: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Self>,
        depth: usize,
    ) -> OrmResult<()> {
        b.record(path, lens.clone(), depth)?;
        i32::collect(
            b,
            &join_path(path, "value"),
            lens.field(|l: &Leaf| &l.value, |l: &mut Leaf| &mut l.value),
            depth + 1,
        )
    }

    fn collect_optional<R: 'static>(
        b: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Option<Self>>,
        depth: usize,
    ) -> OrmResult<()> {
        b.optional_record(path, lens.clone(), depth)?;
        Self::collect(b, path, lens.some(), depth)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Holder {
    child: Option<Box<Leaf>>,
}

impl Property for Holder {
    const RECORD: bool = true;

    fn collect<R: 'static>(
        b: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Self>,
        depth: usize,
    ) -> OrmResult<()> {
        b.record(path, lens.clone(), depth)?;
        Option::<Box<Leaf>>::collect(
            b,
            &join_path(path, "child"),
            lens.field(|h: &Holder| &h.child, |h: &mut Holder| &mut h.child),
            depth + 1,
        )
    }

    fn collect_optional<R: 'static>(
        b: &mut AccessorBuilder<R>,
        path: &str,
        lens: Lens<R, Option<Self>>,
        depth: usize,
    ) -> OrmResult<()> {
        b.optional_record(path, lens.clone(), depth)?;
        Self::collect(b, path, lens.some(), depth)
    }
}

#[test]
fn boxed_optional_record_is_materialized_before_writes() {
    let accessor = Accessor::<Holder>::of().unwrap();
    assert_eq!(accessor.value_paths(), ["child.value"]);
    assert_eq!(
        accessor.property("child").map(|p| p.kind),
        Some(PropertyKind::Record { optional: true })
    );

    let mut h = Holder::default();
    assert_eq!(accessor.get_value(&h, "child.value").unwrap(), None);
    accessor.materialize(&mut h, "child.value");
    accessor
        .set_value(&mut h, "child.value", Some(Value::new(7_i32)))
        .unwrap();
    assert_eq!(h.child.map(|c| c.value), Some(7));
}
