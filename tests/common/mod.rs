#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use dateshift::{DateShiftError, QueryExecutor, QueryResult, Result, Value};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref STRING_LITERAL: Regex = Regex::new(r"'((?:[^']|'')*)'").unwrap();
    static ref EXCLUDED_SCHEMAS: Regex = Regex::new(r"TABLE_SCHEMA NOT IN \(([^)]*)\)").unwrap();
    static ref DATA_TYPES: Regex = Regex::new(r"DATA_TYPE IN \(([^)]*)\)").unwrap();
    static ref TABLE_NAMES: Regex = Regex::new(r"TABLE_NAME\) IN \((.*?)\) GROUP BY").unwrap();
    static ref SELECT_MAX: Regex = Regex::new(r"^SELECT MAX\(\[([^\]]+)\]\) FROM (.+)$").unwrap();
    static ref UPDATE: Regex = Regex::new(r"^UPDATE (\S+) SET (.+)$").unwrap();
    static ref DATEADD: Regex =
        Regex::new(r"\[([^\]]+)\] = DATEADD\(DAY, (-?\d+), \[([^\]]+)\]\)").unwrap();
    static ref BRACKETED: Regex = Regex::new(r"\[((?:[^\]]|\]\])*)\]").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Date,
    DateTime,
    Text,
}

impl ColumnType {
    fn data_type(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Text => "nvarchar",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Cell {
    fn shifted(&self, days: i64) -> Cell {
        match self {
            Self::Date(d) => Self::Date(*d + Duration::days(days)),
            Self::DateTime(dt) => Self::DateTime(*dt + Duration::days(days)),
            other => other.clone(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Date(d) => Value::Date(*d),
            Self::DateTime(dt) => Value::DateTime(*dt),
            Self::Text(s) => Value::Text(s.clone()),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }
}

impl From<NaiveDate> for Cell {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

#[derive(Debug, Clone)]
struct FakeTable {
    schema: String,
    name: String,
    columns: Vec<(String, ColumnType)>,
    rows: Vec<Vec<Cell>>,
}

impl FakeTable {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(c, _)| c == name)
    }
}

/// In-memory stand-in for a SQL Server catalog, driven by the statements
/// the `SqlServer` dialect renders.
pub struct FakeDatabase {
    catalog: String,
    tables: BTreeMap<String, FakeTable>,
    failing: HashSet<String>,
    pub statements: Vec<String>,
}

impl FakeDatabase {
    pub fn new(catalog: &str) -> Self {
        Self {
            catalog: catalog.to_string(),
            tables: BTreeMap::new(),
            failing: HashSet::new(),
            statements: Vec::new(),
        }
    }

    /// `schema_table` is `Schema.Table`, the table name may contain dots;
    /// returns the fully qualified name.
    pub fn create_table(&mut self, schema_table: &str, columns: &[(&str, ColumnType)]) -> String {
        let (schema, name) = schema_table.split_once('.').expect("Schema.Table");
        let full_name = format!("{}.{}", self.catalog, schema_table);
        self.tables.insert(
            full_name.clone(),
            FakeTable {
                schema: schema.to_string(),
                name: name.to_string(),
                columns: columns.iter().map(|(n, t)| (n.to_string(), *t)).collect(),
                rows: Vec::new(),
            },
        );
        full_name
    }

    pub fn insert(&mut self, full_name: &str, row: Vec<Cell>) {
        let table = self.tables.get_mut(full_name).expect("table exists");
        assert_eq!(row.len(), table.columns.len(), "row width");
        table.rows.push(row);
    }

    /// Every MAX/UPDATE touching `full_name` fails from now on.
    pub fn fail_on(&mut self, full_name: &str) {
        self.failing.insert(full_name.to_string());
    }

    pub fn column(&self, full_name: &str, column: &str) -> Vec<Cell> {
        let table = &self.tables[full_name];
        let idx = table.column_index(column).expect("column exists");
        table.rows.iter().map(|row| row[idx].clone()).collect()
    }

    pub fn max_date(&self, full_name: &str, column: &str) -> Option<NaiveDate> {
        self.column(full_name, column)
            .iter()
            .filter_map(Cell::as_date)
            .max()
    }

    pub fn updates(&self) -> Vec<&String> {
        self.statements
            .iter()
            .filter(|s| s.starts_with("UPDATE"))
            .collect()
    }

    fn name_cells(&self, table: &FakeTable) -> Vec<Value> {
        vec![
            Value::from(self.catalog.as_str()),
            Value::from(table.schema.as_str()),
            Value::from(table.name.as_str()),
        ]
    }

    fn fail(&self, sql: &str, message: &str) -> DateShiftError {
        DateShiftError::query(sql, message.to_string())
    }

    fn list_tables(&self, sql: &str) -> Result<QueryResult> {
        let excluded = EXCLUDED_SCHEMAS
            .captures(sql)
            .map(|c| literals(&c[1]))
            .unwrap_or_default();

        let rows = self
            .tables
            .iter()
            .filter(|(_, t)| !excluded.contains(&t.schema))
            .map(|(_, t)| self.name_cells(t))
            .collect();
        Ok(QueryResult::new(
            vec!["TABLE_CATALOG".into(), "TABLE_SCHEMA".into(), "TABLE_NAME".into()],
            rows,
        ))
    }

    fn list_columns(&self, sql: &str) -> Result<QueryResult> {
        let types = DATA_TYPES
            .captures(sql)
            .map(|c| literals(&c[1]))
            .ok_or_else(|| self.fail(sql, "missing DATA_TYPE filter"))?;
        let names = TABLE_NAMES
            .captures(sql)
            .map(|c| literals(&c[1]))
            .ok_or_else(|| self.fail(sql, "missing table filter"))?;

        let mut rows = Vec::new();
        for (name, table) in &self.tables {
            if !names.contains(name) {
                continue;
            }
            let columns: Vec<&str> = table
                .columns
                .iter()
                .filter(|(_, t)| types.iter().any(|ty| ty == t.data_type()))
                .map(|(c, _)| c.as_str())
                .collect();
            if !columns.is_empty() {
                let mut row = self.name_cells(table);
                row.push(Value::from(columns.join(",")));
                rows.push(row);
            }
        }
        Ok(QueryResult::new(
            vec![
                "TABLE_CATALOG".into(),
                "TABLE_SCHEMA".into(),
                "TABLE_NAME".into(),
                "columns".into(),
            ],
            rows,
        ))
    }

    fn select_max(&self, sql: &str, column: &str, table: &str) -> Result<QueryResult> {
        let full_name = unquote(table);
        if self.failing.contains(&full_name) {
            return Err(self.fail(sql, "deadlock victim"));
        }
        let table = self
            .tables
            .get(&full_name)
            .ok_or_else(|| self.fail(sql, "invalid object name"))?;
        let idx = table
            .column_index(column)
            .ok_or_else(|| self.fail(sql, "invalid column name"))?;

        let mut max: Option<&Cell> = None;
        for row in &table.rows {
            let cell = &row[idx];
            let larger = match (max, cell) {
                (_, Cell::Null) => false,
                (None, _) => true,
                (Some(Cell::Date(a)), Cell::Date(b)) => b > a,
                (Some(Cell::DateTime(a)), Cell::DateTime(b)) => b > a,
                (Some(Cell::Text(a)), Cell::Text(b)) => b > a,
                _ => false,
            };
            if larger {
                max = Some(cell);
            }
        }

        Ok(QueryResult::new(
            vec![String::new()],
            vec![vec![max.map_or(Value::Null, Cell::to_value)]],
        ))
    }

    fn update(&mut self, sql: &str, table: &str, assignments: &str) -> Result<QueryResult> {
        let full_name = unquote(table);
        if self.failing.contains(&full_name) {
            return Err(self.fail(sql, "deadlock victim"));
        }

        let shifts: Vec<(String, i64)> = DATEADD
            .captures_iter(assignments)
            .map(|c| {
                assert_eq!(&c[1], &c[3], "assignment shifts its own column");
                (c[1].to_string(), c[2].parse().unwrap())
            })
            .collect();

        let table = self
            .tables
            .get_mut(&full_name)
            .ok_or_else(|| DateShiftError::query(sql, "invalid object name".to_string()))?;
        let mut targets = Vec::new();
        for (column, days) in shifts {
            let idx = table.column_index(&column).ok_or_else(|| {
                DateShiftError::query(sql, "invalid column name".to_string())
            })?;
            targets.push((idx, days));
        }

        for row in &mut table.rows {
            for (idx, days) in &targets {
                row[*idx] = row[*idx].shifted(*days);
            }
        }
        Ok(QueryResult::empty())
    }
}

impl QueryExecutor for FakeDatabase {
    fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        self.statements.push(sql.to_string());

        if sql.contains("FROM INFORMATION_SCHEMA.TABLES") {
            return self.list_tables(sql);
        }
        if sql.contains("FROM INFORMATION_SCHEMA.COLUMNS") {
            return self.list_columns(sql);
        }
        if let Some(c) = SELECT_MAX.captures(sql) {
            return self.select_max(sql, &c[1], &c[2]);
        }
        if let Some(c) = UPDATE.captures(sql) {
            let (table, assignments) = (c[1].to_string(), c[2].to_string());
            return self.update(sql, &table, &assignments);
        }
        Err(self.fail(sql, "unsupported statement"))
    }
}

fn literals(list: &str) -> Vec<String> {
    STRING_LITERAL
        .captures_iter(list)
        .map(|c| c[1].replace("''", "'"))
        .collect()
}

fn unquote(table: &str) -> String {
    BRACKETED
        .captures_iter(table)
        .map(|c| c[1].replace("]]", "]"))
        .collect::<Vec<_>>()
        .join(".")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}
