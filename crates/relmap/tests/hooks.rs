//! Lifecycle hooks opted into with `#[orm(hooks(...))]`.

mod common;

use async_trait::async_trait;
use common::{MockClient, v};
use relmap::{
    Condition, Entity, GenericClient, OrmResult, PostDelete, PostInsert, PostLoad, PostUpdate,
    PreInsert, PreStore, Sql, args,
};

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[orm(
    table = "note",
    hooks(pre_store, pre_insert, post_insert, post_update, post_delete, post_load)
)]
struct Note {
    #[orm(key)]
    id: i64,
    body: String,
    #[orm(select = false, update = false)]
    created_by: Option<String>,
    #[orm(transient)]
    loaded: bool,
}

impl PreStore for Note {
    fn pre_store(&mut self) -> OrmResult<()> {
        self.body = self.body.trim().to_string();
        Ok(())
    }
}

#[async_trait]
impl PreInsert for Note {
    async fn pre_insert(&mut self, _client: &dyn GenericClient) -> OrmResult<u64> {
        self.created_by = Some("tester".into());
        Ok(0)
    }
}

#[async_trait]
impl PostInsert for Note {
    async fn post_insert(&mut self, client: &dyn GenericClient) -> OrmResult<u64> {
        client
            .execute("INSERT INTO note_audit (note_id) VALUES ($1)", &args![self.id])
            .await
    }
}

#[async_trait]
impl PostUpdate for Note {
    async fn post_update(&mut self, client: &dyn GenericClient) -> OrmResult<u64> {
        client
            .execute("UPDATE note_audit SET touched = true WHERE note_id = $1", &args![self.id])
            .await
    }
}

#[async_trait]
impl PostDelete for Note {
    async fn post_delete(&self, client: &dyn GenericClient) -> OrmResult<u64> {
        client
            .execute("DELETE FROM note_audit WHERE note_id = $1", &args![self.id])
            .await
    }
}

impl PostLoad for Note {
    fn post_load(&mut self) -> OrmResult<()> {
        self.loaded = true;
        Ok(())
    }
}

/// An entity without hooks; the defaults report none.
#[derive(Entity, Debug, Default, Clone, PartialEq)]
struct Plain {
    #[orm(key)]
    id: i64,
}

#[tokio::test]
async fn insert_runs_store_and_insert_hooks_in_order() {
    let client = MockClient::new();
    let mut note = Note {
        id: 7,
        body: "  hello  ".into(),
        ..Default::default()
    };
    let count = Sql::<Note>::on(&client)
        .unwrap()
        .insert(&mut note)
        .await
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(note.body, "hello");

    let executed = client.executed();
    assert_eq!(
        executed[0].sql,
        "INSERT INTO note (id, body, created_by) VALUES ($1, $2, $3)"
    );
    assert_eq!(
        executed[0].params,
        vec![v(7_i64), v("hello".to_string()), v("tester".to_string())]
    );
    assert_eq!(executed[1].sql, "INSERT INTO note_audit (note_id) VALUES ($1)");
}

#[tokio::test]
async fn update_and_delete_run_their_post_hooks() {
    let client = MockClient::new();
    let mut note = Note {
        id: 7,
        body: "x ".into(),
        ..Default::default()
    };
    let sql = Sql::<Note>::on(&client).unwrap();
    assert_eq!(sql.update(&mut note).await.unwrap(), 2);
    assert_eq!(sql.delete_record(&note).await.unwrap(), 2);

    assert_eq!(
        client.statements(),
        [
            "UPDATE note t0 SET body = $1 WHERE t0.id = $2",
            "UPDATE note_audit SET touched = true WHERE note_id = $1",
            "DELETE FROM note t0 WHERE t0.id = $1",
            "DELETE FROM note_audit WHERE note_id = $1",
        ]
    );
}

#[tokio::test]
async fn loaded_records_run_post_load() {
    let client = MockClient::new().returning(
        &["id", "body"],
        vec![vec![v(1_i64), v("a".to_string())], vec![v(2_i64), v("b".to_string())]],
    );
    let notes = Sql::<Note>::on(&client)
        .unwrap()
        .where_(Condition::in_list("id", vec![1_i64, 2]))
        .select_all()
        .await
        .unwrap();
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().all(|n| n.loaded && n.created_by.is_none()));
    assert_eq!(
        client.statements(),
        ["SELECT t0.id, t0.body FROM note t0 WHERE t0.id IN ($1, $2)"]
    );
}

#[test]
fn entities_without_hooks_report_none() {
    let mut plain = Plain::default();
    assert!(plain.as_pre_store().is_none());
    assert!(plain.as_post_insert().is_none());
    assert!(plain.as_post_delete().is_none());

    let mut note = Note::default();
    assert!(note.as_pre_store().is_some());
    assert!(note.as_post_delete().is_some());
}
