use std::collections::HashMap;

use serde_json::{Value, json};

use sqlflow::DataSource;
use sqlflow::models::enums::{DatabaseType, JoinKind, SortDirection, StepType};
use sqlflow::models::structs::{ExecutionStep, RowData, TableData};
use sqlflow::query_ast::condition::evaluate;
use sqlflow::query_ast::{
    FlowError, SourceRows, execution_catalog, parse_create_table, parse_execution_order,
    parse_select_query, parse_select_statement, simulate, visualize,
};

fn row(value: Value) -> RowData {
    value.as_object().cloned().expect("object literal")
}

fn table(columns: &[&str], rows: Vec<Value>) -> TableData {
    TableData::new(
        columns.iter().map(|c| c.to_string()).collect(),
        rows.into_iter().map(row).collect(),
    )
}

fn step_types(steps: &[ExecutionStep]) -> Vec<StepType> {
    steps.iter().map(|s| s.step_type).collect()
}

/// Serves fixed tables and answers every query with a canned result.
struct StaticSource {
    tables: HashMap<String, TableData>,
    answer: TableData,
}

#[async_trait::async_trait]
impl DataSource for StaticSource {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    async fn fetch_all_rows(&self, table: &str) -> Result<TableData, FlowError> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| FlowError::delegation(table, "no such table"))
    }

    async fn execute_authoritative(&self, _sql: &str) -> Result<TableData, FlowError> {
        Ok(self.answer.clone())
    }
}

#[test]
fn full_select_step_sequence() {
    let sql = "SELECT DISTINCT u.name, COUNT(o.id) AS orders FROM users u \
               LEFT JOIN orders o ON u.id = o.user_id WHERE u.age > 18 \
               GROUP BY u.name HAVING COUNT(o.id) > 1 ORDER BY orders DESC LIMIT 10 OFFSET 5";
    let steps = parse_execution_order(sql).expect("parse");
    assert_eq!(
        step_types(&steps),
        vec![
            StepType::From,
            StepType::Join,
            StepType::Where,
            StepType::GroupBy,
            StepType::Having,
            StepType::Select,
            StepType::Distinct,
            StepType::OrderBy,
            StepType::Limit,
            StepType::Offset,
        ]
    );
    for (i, step) in steps.iter().enumerate() {
        assert_eq!(step.order, i + 1);
        assert!(!step.description.is_empty());
    }
    assert_eq!(steps[1].clause, "LEFT JOIN orders o ON u.id = o.user_id");
    assert_eq!(steps[9].clause, "OFFSET 5");
}

#[test]
fn steps_are_a_subsequence_of_the_catalog() {
    let catalog: Vec<StepType> = execution_catalog().iter().map(|e| e.step_type).collect();
    assert_eq!(catalog.len(), 10);
    assert_eq!(catalog.first(), Some(&StepType::From));
    assert_eq!(catalog.last(), Some(&StepType::Offset));

    let steps = parse_execution_order("select id from t where id > 1 order by id").unwrap();
    let mut positions = steps
        .iter()
        .map(|s| catalog.iter().position(|c| *c == s.step_type).unwrap());
    let mut last = positions.next().unwrap();
    for p in positions {
        assert!(p >= last);
        last = p;
    }
}

#[test]
fn parsing_is_case_insensitive() {
    let upper = parse_select_query("SELECT a FROM t WHERE a = 1 ORDER BY a DESC").unwrap();
    let lower = parse_select_query("select a from t where a = 1 order by a desc").unwrap();
    assert_eq!(upper, lower);
    assert_eq!(lower.order_by[0].direction, SortDirection::Desc);
}

#[test]
fn function_arguments_stay_in_one_column() {
    let parsed = parse_select_query("SELECT COALESCE(a, b) AS v, c FROM t").unwrap();
    assert_eq!(parsed.columns, vec!["COALESCE(a, b) AS v", "c"]);
}

#[test]
fn clause_keywords_inside_subqueries_are_ignored() {
    let parsed = parse_select_query(
        "SELECT id FROM users WHERE id IN (SELECT user_id FROM orders WHERE total > 5) ORDER BY id",
    )
    .unwrap();
    assert_eq!(
        parsed.where_clause.as_deref(),
        Some("id IN (SELECT user_id FROM orders WHERE total > 5)")
    );
    assert_eq!(parsed.from.len(), 1);
    assert_eq!(parsed.from[0].table, "users");
}

#[test]
fn join_kinds_are_recognised() {
    let parsed = parse_select_query(
        "SELECT * FROM a INNER JOIN b ON a.id = b.id RIGHT OUTER JOIN c ON c.id = a.id \
         FULL JOIN d ON d.id = a.id CROSS JOIN e",
    )
    .unwrap();
    let kinds: Vec<JoinKind> = parsed.joins.iter().map(|j| j.kind).collect();
    assert_eq!(
        kinds,
        vec![JoinKind::Inner, JoinKind::Right, JoinKind::Full, JoinKind::Cross]
    );
    assert_eq!(parsed.joins[3].on_predicate, None);
}

#[test]
fn non_select_is_rejected() {
    let err = parse_execution_order("UPDATE t SET a = 1").unwrap_err();
    assert_eq!(err.query, "UPDATE t SET a = 1");
    assert!(parse_select_query("DELETE FROM t").is_err());
}

#[test]
fn create_table_with_table_level_constraints() {
    let parsed = parse_create_table(
        "CREATE TABLE employees (\n  id INT PRIMARY KEY AUTO_INCREMENT,\n  name VARCHAR(100) NOT NULL UNIQUE,\n  dept_id INT,\n  FOREIGN KEY (dept_id) REFERENCES departments(id)\n);",
    )
    .expect("parse");
    assert_eq!(parsed.table_name, "employees");
    let names: Vec<&str> = parsed.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "dept_id"]);
    assert!(parsed.columns[0].is_primary_key);
    assert!(parsed.columns[0].is_auto_increment);
    assert_eq!(parsed.columns[1].data_type, "VARCHAR(100)");
    assert!(parsed.columns[1].is_not_null);
    assert!(parsed.columns[1].is_unique);
    assert!(parsed.columns[2].references.is_none());
}

#[test]
fn create_table_requires_a_column_list() {
    let err = parse_create_table("CREATE TABLE nothing").unwrap_err();
    assert!(!err.reason.is_empty());
}

#[test]
fn evaluator_recognised_shapes() {
    let r = row(json!({"age": 25, "name": "Alice", "status": null}));
    assert!(evaluate(&r, "age > 18"));
    assert!(!evaluate(&r, "age < 18"));
    assert!(evaluate(&r, "name = 'Alice'"));
    assert!(evaluate(&r, "name LIKE 'al%'"));
    assert!(evaluate(&r, "age > 18 AND name != 'Bob'"));
    assert!(evaluate(&r, "age < 18 OR name = 'Alice'"));
    assert!(evaluate(&r, "status IS NULL"));
    assert!(evaluate(&r, "age BETWEEN 20 AND 30"));
    assert!(evaluate(&r, "age IN (1, 25)"));
    // unknown shapes keep the row
    assert!(evaluate(&r, "some_function(age)"));
    assert!(evaluate(&r, "missing_column = 3"));
}

#[test]
fn distinct_marks_duplicates() {
    let (steps, parsed) = parse_select_statement("SELECT DISTINCT id FROM t").unwrap();
    let primary = table(
        &["id"],
        vec![json!({"id": 1}), json!({"id": 1}), json!({"id": 2})],
    );
    let flow = simulate(&parsed, &steps, &SourceRows { primary, joined: Vec::new() });
    let distinct = flow
        .iter()
        .find(|s| s.step_type == StepType::Distinct)
        .expect("distinct step");
    let included: Vec<bool> = distinct.rows.iter().map(|r| r.included).collect();
    assert_eq!(included, vec![true, false, true]);
    assert_eq!(
        distinct.rows[1].excluded_reason.as_deref(),
        Some("duplicate row removed by DISTINCT")
    );
    assert_eq!(distinct.stats.included_rows, 2);
    assert_eq!(distinct.stats.excluded_rows, 1);
}

#[test]
fn limit_keeps_the_first_rows_and_earlier_snapshots_survive() {
    let (steps, parsed) =
        parse_select_statement("SELECT n FROM t WHERE n > 1 LIMIT 2").unwrap();
    let primary = table(&["n"], (1..=5).map(|n| json!({ "n": n })).collect());
    let flow = simulate(&parsed, &steps, &SourceRows { primary, joined: Vec::new() });
    assert_eq!(
        flow.iter().map(|s| s.step_type).collect::<Vec<_>>(),
        vec![StepType::From, StepType::Where, StepType::Select, StepType::Limit]
    );

    let from = &flow[0];
    assert_eq!(from.stats.included_rows, 5);
    assert!(from.rows.iter().all(|r| r.included));

    let filtered = &flow[1];
    assert_eq!(filtered.stats.included_rows, 4);
    assert!(
        filtered.rows[0]
            .excluded_reason
            .as_deref()
            .is_some_and(|r| r.contains("WHERE"))
    );

    let limited = &flow[3];
    assert_eq!(limited.stats.total_rows, 5);
    assert_eq!(limited.stats.included_rows, 2);
    let kept: Vec<&Value> = limited
        .rows
        .iter()
        .filter(|r| r.included)
        .map(|r| &r.data["n"])
        .collect();
    assert_eq!(kept, vec![&json!(2), &json!(3)]);
    assert_eq!(
        limited.rows[4].excluded_reason.as_deref(),
        Some("excluded by LIMIT 2")
    );
}

#[test]
fn limit_over_all_included_rows() {
    let (steps, parsed) = parse_select_statement("SELECT * FROM t LIMIT 2").unwrap();
    let primary = table(&["id"], (1..=5).map(|id| json!({ "id": id })).collect());
    let flow = simulate(&parsed, &steps, &SourceRows { primary, joined: Vec::new() });
    let limited = flow.last().unwrap();
    assert_eq!(limited.step_type, StepType::Limit);
    let ids: Vec<&Value> = limited.rows.iter().map(|r| &r.data["id"]).collect();
    assert_eq!(ids, vec![&json!(1), &json!(2), &json!(3), &json!(4), &json!(5)]);
    let included: Vec<bool> = limited.rows.iter().map(|r| r.included).collect();
    assert_eq!(included, vec![true, true, false, false, false]);
    assert!(
        limited.rows[2..]
            .iter()
            .all(|r| r.excluded_reason.as_deref() == Some("excluded by LIMIT 2"))
    );
}

#[test]
fn simulation_is_deterministic() {
    let (steps, parsed) =
        parse_select_statement("SELECT name FROM t ORDER BY name DESC").unwrap();
    let sources = SourceRows {
        primary: table(
            &["name"],
            vec![json!({"name": "b"}), json!({"name": "c"}), json!({"name": "a"})],
        ),
        joined: Vec::new(),
    };
    let first = simulate(&parsed, &steps, &sources);
    let second = simulate(&parsed, &steps, &sources);
    assert_eq!(first, second);
    let names: Vec<&Value> = first.last().unwrap().rows.iter().map(|r| &r.data["name"]).collect();
    assert_eq!(names, vec![&json!("c"), &json!("b"), &json!("a")]);
}

#[test]
fn join_appends_qualified_columns() {
    let (steps, parsed) = parse_select_statement(
        "SELECT * FROM users u JOIN orders o ON u.id = o.user_id",
    )
    .unwrap();
    let sources = SourceRows {
        primary: table(&["id", "name"], vec![json!({"id": 1, "name": "Ann"})]),
        joined: vec![table(&["id", "user_id"], vec![json!({"id": 9, "user_id": 1})])],
    };
    let flow = simulate(&parsed, &steps, &sources);
    let join = flow.iter().find(|s| s.step_type == StepType::Join).unwrap();
    assert_eq!(join.columns, vec!["id", "name", "orders.id", "orders.user_id"]);
    assert_eq!(join.rows.len(), 1);
}

#[tokio::test]
async fn visualize_with_a_static_source() {
    let users = table(
        &["id", "age"],
        vec![json!({"id": 1, "age": 15}), json!({"id": 2, "age": 30})],
    );
    let source = StaticSource {
        tables: HashMap::from([("users".to_string(), users)]),
        answer: table(&["id"], vec![json!({"id": 2})]),
    };
    let vis = visualize("SELECT id FROM users WHERE age > 18;", &source)
        .await
        .expect("visualize");
    assert_eq!(vis.original_query, "SELECT id FROM users WHERE age > 18;");
    assert_eq!(vis.execution_steps.len(), 3);
    assert_eq!(vis.data_flow.len(), 3);
    assert_eq!(vis.data_flow[1].stats.included_rows, 1);
    assert_eq!(vis.final_result.rows, vec![row(json!({"id": 2}))]);
}

#[tokio::test]
async fn visualize_rejects_other_statements() {
    let source = StaticSource {
        tables: HashMap::new(),
        answer: TableData::default(),
    };
    let err = visualize("DELETE FROM users", &source).await.unwrap_err();
    assert_eq!(err.code(), "SQL_PARSE_ERROR");
    let body = serde_json::to_value(&err).unwrap();
    assert_eq!(body["code"], json!("SQL_PARSE_ERROR"));
    assert_eq!(body["query"], json!("DELETE FROM users"));
}

#[tokio::test]
async fn visualize_reports_missing_tables_as_delegation_errors() {
    let source = StaticSource {
        tables: HashMap::new(),
        answer: TableData::default(),
    };
    let err = visualize("SELECT * FROM ghosts", &source).await.unwrap_err();
    assert_eq!(err.code(), "EXECUTION_DELEGATION_ERROR");
}

#[tokio::test]
async fn visualize_against_sqlite() {
    let source = sqlflow::open_source("sqlite::memory:", 1).await.expect("open");
    sqlflow::run_script(
        "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, age INTEGER);\n\
         INSERT INTO people (name, age) VALUES ('Ann', 34), ('Bob', 17), ('Cid', 34), ('Dee', 52);",
        source.as_ref(),
    )
    .await
    .expect("seed");

    let vis = visualize(
        "SELECT DISTINCT age FROM people WHERE age >= 18 ORDER BY age DESC",
        source.as_ref(),
    )
    .await
    .expect("visualize");

    assert_eq!(
        vis.data_flow.iter().map(|s| s.step_type).collect::<Vec<_>>(),
        vec![
            StepType::From,
            StepType::Where,
            StepType::Select,
            StepType::Distinct,
            StepType::OrderBy
        ]
    );
    let last = vis.data_flow.last().unwrap();
    let ages: Vec<&Value> = last
        .rows
        .iter()
        .filter(|r| r.included)
        .map(|r| &r.data["age"])
        .collect();
    assert_eq!(ages, vec![&json!(52), &json!(34)]);
    assert_eq!(vis.final_result.columns, vec!["age"]);
    assert_eq!(
        vis.final_result.rows,
        vec![row(json!({"age": 52})), row(json!({"age": 34}))]
    );
}

#[test]
fn create_table_keeps_columns_named_like_index_keywords() {
    let parsed =
        parse_create_table("CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT)").unwrap();
    let names: Vec<&str> = parsed.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["key", "value"]);
    assert!(parsed.columns[0].is_primary_key);
    assert_eq!(parsed.columns[0].data_type, "TEXT");
}

#[tokio::test]
async fn joined_headers_that_repeat_keep_every_cell() {
    let source = sqlflow::open_source("sqlite::memory:", 1).await.expect("open");
    sqlflow::run_script(
        "CREATE TABLE a (id INTEGER, name TEXT);\n\
         CREATE TABLE b (id INTEGER, a_id INTEGER);\n\
         INSERT INTO a VALUES (1, 'x');\n\
         INSERT INTO b VALUES (7, 1);",
        source.as_ref(),
    )
    .await
    .expect("seed");

    let sql = "SELECT a.id, b.id FROM a JOIN b ON a.id = b.a_id";
    let direct = source.execute_authoritative(sql).await.expect("query");
    assert_eq!(direct.columns, vec!["id", "id_1"]);
    assert_eq!(direct.rows, vec![row(json!({"id": 1, "id_1": 7}))]);

    let vis = visualize(sql, source.as_ref()).await.expect("visualize");
    let select = vis
        .data_flow
        .iter()
        .find(|s| s.step_type == StepType::Select)
        .expect("select step");
    assert_eq!(select.columns, vis.final_result.columns);
    assert!(select.rows.iter().all(|r| r.data.len() == 2));
    assert_eq!(vis.final_result.rows, direct.rows);
}
