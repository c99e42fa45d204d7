//! Hand-written record fixtures for unit tests.

use crate::entity::FieldMeta;

/// Declare a flat fixture record (and optionally its entity impl).
macro_rules! fixture {
    (record $name:ident { $($field:ident : $ty:ty $([$meta:expr])?),* $(,)? }) => {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub(crate) struct $name {
            $(pub $field: $ty),*
        }

        impl $crate::accessor::Property for $name {
            const RECORD: bool = true;

            fn collect<R: 'static>(
                b: &mut $crate::accessor::AccessorBuilder<R>,
                path: &str,
                lens: $crate::accessor::Lens<R, Self>,
                depth: usize,
            ) -> $crate::error::OrmResult<()> {
                b.record(path, lens.clone(), depth)?;
                $(
                    $( b.tag(&$crate::accessor::join_path(path, stringify!($field)), $meta); )?
                    <$ty as $crate::accessor::Property>::collect(
                        b,
                        &$crate::accessor::join_path(path, stringify!($field)),
                        lens.field(|s: &$name| &s.$field, |s: &mut $name| &mut s.$field),
                        depth + 1,
                    )?;
                )*
                Ok(())
            }

            fn collect_optional<R: 'static>(
                b: &mut $crate::accessor::AccessorBuilder<R>,
                path: &str,
                lens: $crate::accessor::Lens<R, Option<Self>>,
                depth: usize,
            ) -> $crate::error::OrmResult<()> {
                b.optional_record(path, lens.clone(), depth)?;
                Self::collect(b, path, lens.some(), depth)
            }
        }
    };
    (entity $name:ident = $table:literal $([$($path:literal => $ometa:expr),* $(,)?])? { $($body:tt)* }) => {
        fixture!(record $name { $($body)* });

        impl $crate::entity::Entity for $name {
            fn table_name() -> String {
                $table.to_string()
            }

            fn overrides() -> Vec<(&'static str, $crate::entity::FieldMeta)> {
                vec![$($(($path, $ometa)),*)?]
            }
        }
    };
}

pub(crate) use fixture;

fixture!(record Name {
    first: String,
    last: String,
});

fixture!(entity Person = "person" ["name.first" => FieldMeta::new().column("firstName")] {
    id: i64 [FieldMeta::new().key(true)],
    name: Name,
    age: Option<i32>,
    city_id: Option<i64>,
});

fixture!(entity City = "city" {
    id: i64 [FieldMeta::new().key(true)],
    name: String,
});

fixture!(entity Tag = "public.tag" {
    person_id: i64,
    label: String,
    note: Option<String>,
});

pub(crate) fn person(id: i64, first: &str, last: &str) -> Person {
    Person {
        id,
        name: Name {
            first: first.to_string(),
            last: last.to_string(),
        },
        age: None,
        city_id: None,
    }
}
