//! Run with `--features sqlite`

use chainsql_core::{inc, op, Db, DbConfig, SortDirection};

#[tokio::main]
async fn main() -> chainsql_core::Result<()> {
    let config = DbConfig::new("sqlite::memory:").max_connections(1);
    let mut db = Db::connect(config).await?;
    db.ping().await?;

    db.raw_query(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, login TEXT UNIQUE, age INTEGER, visits INTEGER DEFAULT 0)",
        vec![],
    )
    .await?;

    let id = db
        .insert("users", vec![("login", "admin".into()), ("age", chainsql_core::Value::I32(41))])
        .await?;
    println!("inserted admin as {:?}", id);

    db.insert_multi(
        "users",
        vec![
            vec![("login", chainsql_core::Value::from("ann")), ("age", 17.into())],
            vec![("login", "bob".into()), ("age", 25.into())],
        ],
    )
    .await?;

    let adults = db
        .where_(("age", op::GTE, 18))
        .order_by("login", SortDirection::Asc)
        .get("users")
        .await?;
    for user in &adults {
        println!("{:?}", user);
    }

    db.where_(("login", "bob"))
        .update("users", vec![("visits", inc(1))])
        .await?;
    println!("last query: {:?}", db.last_query());

    // A duplicate login fails; the error is returned and also kept around
    if db.insert("users", vec![("login", "admin")]).await.is_err() {
        println!("insert failed: {}", db.last_error().unwrap_or_default());
    }

    db.start_transaction().await?;
    db.where_(("login", "ann")).delete("users").await?;
    db.rollback().await?;
    println!("ann still there: {}", db.where_(("login", "ann")).has("users").await?);

    Ok(())
}
