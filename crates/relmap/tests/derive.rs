//! Metadata produced by the derive macros.

use relmap::{
    Entity, EntityInfo, OpExpr, OrmError, PostgresDialect, Record, Sql, TypeConverter, TypeKey,
    Value, ValueEnum,
};

#[derive(Record, Debug, Default, Clone, PartialEq)]
struct Address {
    street: String,
    zip: Option<String>,
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
struct OrderLine {
    #[orm(key)]
    order_id: i64,
    #[orm(key, column = "lineNo")]
    line_no: i32,
    #[orm(column_type = "jsonb")]
    payload: Option<serde_json::Value>,
    #[orm(select_expr = "lower({})", insert_expr = "upper({})", update_expr = "trim({})")]
    sku: String,
    #[orm(select = false, insert = false)]
    updated_at: Option<i64>,
    #[orm(transient)]
    cached: Option<Address>,
    ship_to: Address,
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[orm(table_from = OrderLine)]
struct LineKey {
    order_id: i64,
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[orm(table = "sales.orders")]
struct Order {
    #[orm(key)]
    id: i64,
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
struct Node {
    id: i64,
    child: Option<Box<Node>>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
enum Status {
    Active,
    OnHold,
    #[orm(rename = "gone")]
    Deleted,
}

#[test]
fn table_names_follow_the_type_name_or_attributes() {
    assert_eq!(OrderLine::table_name(), "order_line");
    assert_eq!(LineKey::table_name(), "order_line");
    assert_eq!(Order::table_name(), "sales.orders");

    let info = EntityInfo::of::<Order>().unwrap();
    assert_eq!(info.table().parts().len(), 2);
    assert_eq!(info.table().last_name(), "orders");
}

#[test]
fn column_attributes_shape_the_metadata() {
    let info = EntityInfo::of::<OrderLine>().unwrap();
    let properties: Vec<&str> = info.columns().iter().map(|c| c.property()).collect();
    assert_eq!(
        properties,
        [
            "order_id",
            "line_no",
            "payload",
            "sku",
            "updated_at",
            "ship_to.street",
            "ship_to.zip"
        ]
    );

    let keys: Vec<&str> = info.keys().map(|c| c.column_name()).collect();
    assert_eq!(keys, ["order_id", "lineNo"]);

    let payload = info.column(info.find("payload").unwrap());
    assert_eq!(payload.column_type(), Some("jsonb"));
    assert!(payload.is_nullable());

    let updated = info.column(info.find("updated_at").unwrap());
    assert!(updated.select_expr().is_excluded());
    assert!(updated.insert_expr().is_excluded());
    assert_eq!(updated.update_expr(), &OpExpr::Plain);

    let sku = info.column(info.find("sku").unwrap());
    assert_eq!(sku.select_expr(), &OpExpr::Custom("lower({})".into()));
    assert!(!sku.is_nullable());

    // Lookup falls back to the column name.
    assert_eq!(info.find("lineNo"), info.find("line_no"));
    assert!(info.find("cached").is_none());
    assert!(info.find("cached.street").is_none());
}

#[test]
fn custom_expressions_wrap_columns_and_values() {
    let line = OrderLine {
        order_id: 1,
        line_no: 2,
        sku: "ab-1".into(),
        ..Default::default()
    };
    let sql = Sql::<OrderLine>::new().unwrap();

    let select = sql.to_select_sql(&PostgresDialect).unwrap();
    assert_eq!(
        select.sql(),
        "SELECT t0.order_id, t0.\"lineNo\", t0.payload, lower(t0.sku) AS sku, \
         t0.street, t0.zip FROM order_line t0"
    );

    let insert = sql.to_insert_sql(&PostgresDialect, &line).unwrap();
    assert_eq!(
        insert.sql(),
        "INSERT INTO order_line (order_id, \"lineNo\", payload, sku, street, zip) \
         VALUES ($1, $2, $3::jsonb, upper($4), $5, $6)"
    );
    assert_eq!(insert.params()[3], Some(Value::new("ab-1".to_string())));

    let update = sql.to_update_sql(&PostgresDialect, &line).unwrap();
    assert_eq!(
        update.sql(),
        "UPDATE order_line t0 SET payload = $1::jsonb, sku = trim($2), updated_at = $3, \
         street = $4, zip = $5 WHERE t0.order_id = $6 AND t0.\"lineNo\" = $7"
    );
}

#[test]
fn unbounded_recursion_is_a_configuration_error() {
    let err = EntityInfo::of::<Node>().unwrap_err();
    assert!(matches!(err, OrmError::Config(_)), "{err}");
}

#[test]
fn value_enums_convert_through_their_labels() {
    let text = TypeConverter::convert(Some(Value::new(Status::OnHold)), TypeKey::of::<String>())
        .unwrap();
    assert_eq!(text, Some(Value::new("on_hold".to_string())));

    let back: Status = TypeConverter::convert_to(Value::new("gone".to_string())).unwrap();
    assert_eq!(back, Status::Deleted);

    let err = TypeConverter::convert_to::<Status>(Value::new("deleted".to_string())).unwrap_err();
    assert!(matches!(err, OrmError::ConversionFailed { .. }));
}
