//! Sample sales database: schema creation, deterministic-or-random seeding,
//! and read-only query execution for the chat agent.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use salesvox_contracts::records::Row;

pub const SEED_SALES_ROWS: usize = 600;

const PRODUCTS: &[&str] = &[
    "Laptop Pro",
    "Wireless Mouse",
    "Mechanical Keyboard",
    "USB-C Hub",
    "Monitor 27in",
    "Webcam HD",
    "Headphones",
    "Desk Lamp",
    "Standing Desk",
    "Ergonomic Chair",
    "Tablet",
    "Smartphone",
    "Smartwatch",
    "Bluetooth Speaker",
    "Power Bank",
    "Cable Set",
    "Screen Protector",
    "Laptop Bag",
    "USB Drive",
    "External SSD",
    "Gaming Mouse",
    "RGB Keyboard",
    "Microphone",
    "Streaming Camera",
];

const CUSTOMERS: &[&str] = &[
    "Acme Corp",
    "Tech Solutions Inc",
    "Global Industries",
    "Digital Ventures",
    "Innovation Labs",
    "Future Systems",
    "Cloud Services",
    "Data Analytics Co",
    "Software Solutions",
    "Hardware Plus",
    "Network Systems",
    "Security Pro",
    "Enterprise Solutions",
    "Startup Hub",
    "Dev Tools Inc",
    "AI Research Lab",
    "Blockchain Co",
    "Mobile Apps Ltd",
    "Web Services",
    "IT Consulting",
];

const REGIONS: &[&str] = &[
    "North America",
    "Europe",
    "Asia Pacific",
    "South America",
    "Middle East",
    "Africa",
];

const CATEGORIES: &[&str] = &[
    "Electronics",
    "Accessories",
    "Furniture",
    "Software",
    "Services",
];

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sales (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    customer TEXT NOT NULL,
    product TEXT NOT NULL,
    category TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    unit_price REAL NOT NULL,
    total_amount REAL NOT NULL,
    region TEXT NOT NULL,
    sales_rep TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    region TEXT NOT NULL,
    contact_email TEXT,
    total_orders INTEGER DEFAULT 0,
    total_spent REAL DEFAULT 0.0
);
";

/// Executes select text handed over by the dispatcher after the gate passed it.
pub trait QueryStore: Send + Sync {
    fn execute(&self, select_text: &str) -> Result<Vec<Row>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub row_count: u64,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueLine {
    pub label: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSpend {
    pub name: String,
    pub total_spent: f64,
    pub total_orders: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessOverview {
    pub total_sales_records: u64,
    pub total_customers: u64,
    pub total_revenue: f64,
    pub top_products: Vec<RevenueLine>,
    pub revenue_by_region: Vec<RevenueLine>,
    pub revenue_by_category: Vec<RevenueLine>,
    pub top_customers: Vec<CustomerSpend>,
}

#[derive(Debug, Clone)]
pub struct SalesStore {
    path: PathBuf,
}

impl SalesStore {
    /// Opens (creating if needed) the database file and ensures the schema.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        conn.execute_batch(SCHEMA)
            .context("failed to create sales schema")?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fills an empty `sales` table with sample rows and derives `customers`
    /// from them. Returns the number of sales rows inserted (0 when the table
    /// already had data). `None` seeds from entropy.
    pub fn seed_if_empty(&self, seed: Option<u64>) -> Result<usize> {
        let mut conn = Connection::open(&self.path)
            .with_context(|| format!("failed to open database {}", self.path.display()))?;
        let existing: i64 = conn.query_row("SELECT COUNT(*) FROM sales", [], |row| row.get(0))?;
        if existing > 0 {
            return Ok(0);
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).context("invalid seed start date")?;

        info!("Generating sample sales data...");
        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO sales (date, customer, product, category, quantity, unit_price, total_amount, region, sales_rep)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for _ in 0..SEED_SALES_ROWS {
                let date = start
                    .checked_add_days(Days::new(rng.gen_range(0..=365)))
                    .context("seed date out of range")?;
                let quantity: i64 = rng.gen_range(1..=10);
                let unit_price = round_cents(rng.gen_range(10.0..2000.0));
                let total_amount = round_cents(quantity as f64 * unit_price);
                let sales_rep = format!("Rep_{}", rng.gen_range(1..=10));
                insert.execute(params![
                    date.format("%Y-%m-%d").to_string(),
                    pick(&mut rng, CUSTOMERS),
                    pick(&mut rng, PRODUCTS),
                    pick(&mut rng, CATEGORIES),
                    quantity,
                    unit_price,
                    total_amount,
                    pick(&mut rng, REGIONS),
                    sales_rep,
                ])?;
            }

            let mut totals = tx.prepare(
                "SELECT COUNT(*), COALESCE(SUM(total_amount), 0.0) FROM sales WHERE customer = ?1",
            )?;
            let mut upsert = tx.prepare(
                "INSERT OR REPLACE INTO customers (name, region, contact_email, total_orders, total_spent)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for customer in CUSTOMERS {
                let (orders, spent): (i64, f64) =
                    totals.query_row(params![customer], |row| Ok((row.get(0)?, row.get(1)?)))?;
                let email = format!("{}@example.com", customer.to_lowercase().replace(' ', "_"));
                upsert.execute(params![
                    customer,
                    pick(&mut rng, REGIONS),
                    email,
                    orders,
                    spent
                ])?;
            }
        }
        tx.commit().context("failed to commit seed data")?;
        info!("Database created with {SEED_SALES_ROWS} sales records");
        Ok(SEED_SALES_ROWS)
    }

    /// Runs select text on a read-only connection and returns every row with
    /// columns in select-list order.
    pub fn execute(&self, select_text: &str) -> Result<Vec<Row>> {
        let conn = self.read_only()?;
        let mut stmt = conn.prepare(select_text)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::with_capacity(columns.len());
            for (index, name) in columns.iter().enumerate() {
                record.insert(name.clone(), column_value(row.get_ref(index)?));
            }
            out.push(record);
        }
        Ok(out)
    }

    pub fn table_info(&self) -> Result<IndexMap<String, TableInfo>> {
        let conn = self.read_only()?;
        let mut names_stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = names_stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        let mut info = IndexMap::new();
        for name in names {
            let quoted = name.replace('"', "\"\"");
            let row_count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM \"{quoted}\""), [], |row| {
                    row.get(0)
                })?;
            let mut pragma = conn.prepare(&format!("PRAGMA table_info(\"{quoted}\")"))?;
            let columns = pragma
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            info.insert(
                name,
                TableInfo {
                    row_count: row_count.max(0) as u64,
                    columns,
                },
            );
        }
        Ok(info)
    }

    pub fn overview(&self) -> Result<BusinessOverview> {
        let conn = self.read_only()?;
        let total_sales_records: i64 =
            conn.query_row("SELECT COUNT(*) FROM sales", [], |row| row.get(0))?;
        let total_customers: i64 =
            conn.query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;
        let total_revenue: f64 = conn.query_row(
            "SELECT COALESCE(SUM(total_amount), 0.0) FROM sales",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT name, total_spent, total_orders FROM customers ORDER BY total_spent DESC LIMIT 10",
        )?;
        let top_customers = stmt
            .query_map([], |row| {
                Ok(CustomerSpend {
                    name: row.get(0)?,
                    total_spent: row.get(1)?,
                    total_orders: row.get::<_, i64>(2)?.max(0) as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(BusinessOverview {
            total_sales_records: total_sales_records.max(0) as u64,
            total_customers: total_customers.max(0) as u64,
            total_revenue,
            top_products: revenue_lines(
                &conn,
                "SELECT product, SUM(total_amount) AS revenue FROM sales GROUP BY product ORDER BY revenue DESC LIMIT 5",
            )?,
            revenue_by_region: revenue_lines(
                &conn,
                "SELECT region, SUM(total_amount) AS revenue FROM sales GROUP BY region ORDER BY revenue DESC",
            )?,
            revenue_by_category: revenue_lines(
                &conn,
                "SELECT category, SUM(total_amount) AS revenue FROM sales GROUP BY category ORDER BY revenue DESC",
            )?,
            top_customers,
        })
    }

    fn read_only(&self) -> Result<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open database {} read-only", self.path.display()))
    }
}

impl QueryStore for SalesStore {
    fn execute(&self, select_text: &str) -> Result<Vec<Row>> {
        SalesStore::execute(self, select_text)
    }
}

fn revenue_lines(conn: &Connection, sql: &str) -> Result<Vec<RevenueLine>> {
    let mut stmt = conn.prepare(sql)?;
    let lines = stmt
        .query_map([], |row| {
            Ok(RevenueLine {
                label: row.get(0)?,
                revenue: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(lines)
}

fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::from(number),
        ValueRef::Real(number) => serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
