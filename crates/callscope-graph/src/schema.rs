//! Neo4j schema for the call graph (constraints and indexes).
//!
//! The statements use `IF NOT EXISTS`, so every export script can carry them
//! and re-running a load is harmless.

/// Lookup indexes used by the structural queries.
pub const INDEX_STATEMENTS: &[&str] = &[
    "CREATE INDEX class_name IF NOT EXISTS FOR (c:Class) ON (c.name)",
    "CREATE INDEX class_simple_name IF NOT EXISTS FOR (c:Class) ON (c.simpleName)",
    "CREATE INDEX class_layer IF NOT EXISTS FOR (c:Class) ON (c.layer)",
    "CREATE INDEX class_domain IF NOT EXISTS FOR (c:Class) ON (c.businessDomain)",
    "CREATE INDEX method_name IF NOT EXISTS FOR (m:Method) ON (m.name)",
    "CREATE INDEX method_class IF NOT EXISTS FOR (m:Method) ON (m.classId)",
];

/// Uniqueness constraints on entity ids.
pub const CONSTRAINT_STATEMENTS: &[&str] = &[
    "CREATE CONSTRAINT class_id IF NOT EXISTS FOR (c:Class) REQUIRE c.id IS UNIQUE",
    "CREATE CONSTRAINT method_id IF NOT EXISTS FOR (m:Method) REQUIRE m.id IS UNIQUE",
];
