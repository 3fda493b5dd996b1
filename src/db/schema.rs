//! Idempotent schema bootstrap. Runs on every start.

use diesel::result::QueryResult;

use super::connection::DbConnection;

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant_slug TEXT NOT NULL,
        customer_name TEXT,
        customer_phone TEXT,
        order_type TEXT NOT NULL,
        table_number TEXT,
        address_json TEXT,
        status TEXT NOT NULL,
        total INTEGER NOT NULL,
        payment_method TEXT,
        payment_status TEXT,
        tip_amount INTEGER DEFAULT 0,
        created_at TEXT NOT NULL,
        order_notes TEXT,
        shipping_cost INTEGER DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS order_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL,
        tenant_slug TEXT NOT NULL,
        product_id TEXT,
        name TEXT NOT NULL,
        qty INTEGER NOT NULL,
        unit_price INTEGER NOT NULL,
        modifiers_json TEXT,
        notes TEXT,
        FOREIGN KEY(order_id) REFERENCES orders(id)
    )",
    "CREATE TABLE IF NOT EXISTS order_status_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL,
        status TEXT NOT NULL,
        changed_at TEXT NOT NULL,
        changed_by TEXT,
        FOREIGN KEY(order_id) REFERENCES orders(id)
    )",
    "CREATE TABLE IF NOT EXISTS archived_orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL,
        tenant_slug TEXT NOT NULL,
        type TEXT NOT NULL,
        archived_at TEXT NOT NULL,
        FOREIGN KEY(order_id) REFERENCES orders(id)
    )",
    "CREATE TABLE IF NOT EXISTS tenant_config (
        tenant_slug TEXT PRIMARY KEY,
        config_json TEXT
    )",
    "CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant_slug TEXT NOT NULL,
        product_id TEXT NOT NULL,
        name TEXT NOT NULL,
        price INTEGER NOT NULL,
        stock INTEGER NOT NULL DEFAULT 0,
        active INTEGER NOT NULL DEFAULT 1,
        details TEXT,
        variants_json TEXT,
        last_modified TEXT,
        image_url TEXT,
        UNIQUE(tenant_slug, product_id)
    )",
    "CREATE TABLE IF NOT EXISTS admin_users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant_slug TEXT NOT NULL,
        username TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        UNIQUE(tenant_slug, username)
    )",
    "CREATE TABLE IF NOT EXISTS order_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL,
        event_type TEXT NOT NULL,
        actor TEXT,
        terminal TEXT,
        amount_delta INTEGER,
        payload_json TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY(order_id) REFERENCES orders(id)
    )",
    "CREATE TABLE IF NOT EXISTS cash_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant_slug TEXT NOT NULL,
        opened_at TEXT NOT NULL,
        opened_by TEXT,
        opening_amount INTEGER NOT NULL,
        notes_open TEXT,
        closed_at TEXT,
        closed_by TEXT,
        closing_amount INTEGER,
        notes_close TEXT,
        closing_diff INTEGER,
        closing_metadata TEXT
    )",
    "CREATE TABLE IF NOT EXISTS cash_movements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id INTEGER NOT NULL,
        type TEXT NOT NULL,
        amount INTEGER NOT NULL,
        note TEXT,
        actor TEXT,
        created_at TEXT NOT NULL,
        payment_method TEXT,
        FOREIGN KEY(session_id) REFERENCES cash_sessions(id)
    )",
    "CREATE TABLE IF NOT EXISTS carousel_slides (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant_slug TEXT NOT NULL,
        image_url TEXT NOT NULL,
        title TEXT,
        text TEXT,
        position INTEGER DEFAULT 0,
        active INTEGER DEFAULT 1,
        created_at TEXT,
        title_color TEXT,
        text_color TEXT
    )",
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_orders_tenant_status ON orders(tenant_slug, status)",
    "CREATE INDEX IF NOT EXISTS idx_orders_created ON orders(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_orders_tenant_created ON orders(tenant_slug, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_orders_tenant_type ON orders(tenant_slug, order_type)",
    "CREATE INDEX IF NOT EXISTS idx_orders_tenant_phone ON orders(tenant_slug, customer_phone)",
    "CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id)",
    "CREATE INDEX IF NOT EXISTS idx_order_history_order ON order_status_history(order_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_archived_unique ON archived_orders(order_id, type)",
    "CREATE INDEX IF NOT EXISTS idx_products_tenant ON products(tenant_slug)",
    "CREATE INDEX IF NOT EXISTS idx_admin_users_tenant ON admin_users(tenant_slug)",
    "CREATE INDEX IF NOT EXISTS idx_order_events_order ON order_events(order_id)",
    "CREATE INDEX IF NOT EXISTS idx_cash_sessions_tenant ON cash_sessions(tenant_slug)",
    "CREATE INDEX IF NOT EXISTS idx_cash_sessions_open ON cash_sessions(tenant_slug, opened_at)",
    "CREATE INDEX IF NOT EXISTS idx_cash_movements_session ON cash_movements(session_id)",
    "CREATE INDEX IF NOT EXISTS idx_carousel_tenant ON carousel_slides(tenant_slug)",
];

/// Columns added after the first release: (table, column, definition)
const LATE_COLUMNS: &[(&str, &str, &str)] = &[
    ("orders", "order_notes", "TEXT"),
    ("orders", "tip_amount", "INTEGER DEFAULT 0"),
    ("orders", "shipping_cost", "INTEGER DEFAULT 0"),
    ("order_status_history", "changed_by", "TEXT"),
];

/// Creates missing tables and indexes and adds columns missing on legacy databases
pub fn bootstrap(conn: &DbConnection) -> QueryResult<()> {
    conn.transaction(|| {
        for statement in TABLES {
            conn.batch_execute(statement)?;
        }
        for &(table, column, definition) in LATE_COLUMNS {
            let columns = conn.table_columns(table)?;
            if !columns.iter().any(|c| c == column) {
                info!("Adding missing column {}.{}", table, column);
                conn.batch_execute(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition))?;
            }
        }
        for statement in INDEXES {
            conn.batch_execute(statement)?;
        }
        Ok(())
    })
}
