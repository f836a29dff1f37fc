use chainsql_core::builder::{delete, insert, select, update, InsertVerb};
use chainsql_core::{inc, now, op, IntoRowData, JoinType, Operator, QueryState, SortDirection};

fn main() -> chainsql_core::Result<()> {
    // SELECT with clean where syntax
    let mut state = QueryState::new();
    state
        .select(("id", "name", "email"))
        .where_(("age", op::GT, 18)) // Using op constants
        .where_(("status", "active")) // Defaults to EQ
        .where_(("city", "LIKE", "%York%")) // Using string operators
        .where_in("role", vec!["admin", "editor"])
        .limit((5u64, 10u64));

    let stmt = select::select(&state, "users")?;
    println!("SELECT SQL: {}", stmt);
    println!("  params: {:?}", stmt.params);

    // Joins, grouping and having
    let mut state = QueryState::new();
    state
        .select(("u.name", "COUNT(o.id) AS orders"))
        .join("orders o", "o.user_id = u.id", JoinType::Left)
        .join_where_raw("orders o", ("o.status", "paid"))
        .group_by("u.name")
        .having(("COUNT(o.id)", op::GTE, 3))
        .order_by("orders", SortDirection::Desc);
    println!("REPORT SQL: {}", select::select(&state, "users u")?);

    // INSERT keeps the row's column order
    let row = vec![("name", "John Doe"), ("email", "john@example.com")].into_row_data();
    println!(
        "INSERT SQL: {}",
        insert::insert("users", &row, InsertVerb::Insert)?
    );

    // UPDATE binds SET values before WHERE values
    let mut state = QueryState::new();
    state.where_(("id", 123)).where_(("active", true));
    let data = vec![
        ("email", chainsql_core::Field::from("new@example.com")),
        ("logins", inc(1)),
        ("last_login", now()),
    ]
    .into_row_data();
    let stmt = update::update(&state, "users", &data)?;
    println!("UPDATE SQL: {}", stmt);
    println!("  params: {:?}", stmt.params);

    // DELETE without a WHERE needs an explicit opt-in
    let mut state = QueryState::new();
    state
        .where_(("age", op::LT, 13))
        .or_where(("last_login", op::LT, "2020-01-01"));
    println!("DELETE SQL: {}", delete::delete(&state, "users")?);
    if let Err(err) = delete::delete(&QueryState::new(), "users") {
        println!("Refused: {}", err);
    }

    // Custom operators for advanced database features
    let mut state = QueryState::new();
    state
        .select(("title", "content"))
        .where_(("content", Operator::custom("@@"), "search query"))
        .limit(20u64);
    println!("FTS SQL: {}", select::select(&state, "documents")?);

    Ok(())
}
