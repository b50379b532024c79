//! Database schema definitions

/// SQL to create the nodes table
pub const CREATE_NODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    path TEXT PRIMARY KEY,
    parent TEXT,
    name TEXT NOT NULL,
    node_type TEXT NOT NULL,
    position INTEGER NOT NULL
)
"#;

/// SQL to create the properties table
/// One row per named property; `multiple` marks multi-valued properties
pub const CREATE_PROPERTIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS properties (
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    position INTEGER NOT NULL,
    multiple INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (path, name)
)
"#;

/// SQL to create the property_values table
/// `value` is left untyped so each row keeps its SQLite storage class
pub const CREATE_PROPERTY_VALUES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS property_values (
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    idx INTEGER NOT NULL,
    kind TEXT NOT NULL,
    value,
    PRIMARY KEY (path, name, idx)
)
"#;

/// The root node always exists
pub const INSERT_ROOT_NODE: &str =
    "INSERT OR IGNORE INTO nodes (path, parent, name, node_type, position) VALUES ('/', NULL, '', 'dg:root', 0)";

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent, position)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(node_type)",
];

/// Get all schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_NODES_TABLE,
        CREATE_PROPERTIES_TABLE,
        CREATE_PROPERTY_VALUES_TABLE,
        INSERT_ROOT_NODE,
    ];
    stmts.extend(CREATE_INDEXES);
    stmts
}
