//! # Dialect preview
//!
//! Prints the statements one chain produces for every dialect, using the
//! recording store so no database is needed. The select-then-write upsert
//! used by SQL Server and ANSI is shown from the recorded statement log.

use std::sync::Arc;

use sqlcache::prelude::*;

#[model]
#[table(name = "users")]
pub struct User {
    #[primary_key]
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub disabled: bool,
}

fn sample() -> User {
    User {
        id: 0,
        name: "O'Neil".to_string(),
        phone: "8613011112222".to_string(),
        disabled: false,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    for dialect in Dialect::ALL {
        let store = RecordingStore::new(dialect);
        let engine = Engine::new(Arc::new(store.clone()), EngineConfig::default());

        println!("== {} ==", dialect);

        let page = engine
            .table("orders")
            .select(["user_id", "sum(amount)"])
            .filter("amount > 0")
            .group_by(["user_id"])
            .order_by(["user_id"])
            .desc()
            .limit(10)
            .offset(20)
            .build(OperationKind::Query)?;
        println!("query:  {}", page);

        let mut user = sample();
        let insert = engine.model(&mut user).build(OperationKind::Insert)?;
        println!("insert: {}", insert);

        let mut user = sample();
        user.id = 7;
        let update = engine
            .model(&mut user)
            .select(["name", "disabled"])
            .build(OperationKind::Update)?;
        println!("update: {}", update);

        let mut user = sample();
        match engine
            .model(&mut user)
            .select(["name"])
            .on_conflict(["phone"])
            .build(OperationKind::Upsert)
        {
            Ok(sql) => println!("upsert: {}", sql),
            Err(EngineError::Unsupported(_)) => {
                engine
                    .model(&mut user)
                    .select(["name"])
                    .on_conflict(["phone"])
                    .upsert()
                    .await?;
                for statement in store.statements() {
                    println!("upsert: {}", statement);
                }
            }
            Err(err) => return Err(err.into()),
        }

        match engine.table("users").build(OperationKind::Delete) {
            Ok(sql) => println!("delete: {}", sql),
            Err(err) => println!("delete: refused ({})", err),
        }
        println!();
    }
    Ok(())
}
