//! Inventory Introspection Module
//!
//! Walks a live PostgreSQL catalog and produces an [`Inventory`]:
//! users (schemas) -> tables -> fields, privileges, indexes and row counts.

use crate::config::NameFilter;
use crate::error::AppError;
use crate::inventory::{filter_names, FieldAttrs, IndexAttrs, Inventory, TableEntry, UserTables};
use deadpool_postgres::{Client, Pool};
use serde_json::{json, Map};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, info};

/// Tables captured per user in debug mode
const DEBUG_TABLE_LIMIT: usize = 2;

/// What to capture
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    pub users: NameFilter,
    /// Capture only the first user and its first two tables
    pub debug: bool,
}

/// Inventory introspector for PostgreSQL
pub struct PostgresIntrospector;

impl PostgresIntrospector {
    /// Capture the complete inventory of a PostgreSQL database
    pub async fn introspect(pool: &Pool, options: &CaptureOptions) -> Result<Inventory, AppError> {
        let started = Instant::now();
        let client = pool.get().await?;

        let all_users = Self::get_users(&client).await?;
        let mut users = filter_names(&all_users, &options.users.include, &options.users.exclude);
        if options.debug {
            users.truncate(1);
        }

        let mut inventory = Inventory::new();

        for user in users {
            debug!("Capturing user {}", user);

            let mut table_names = Self::get_tables(&client, &user).await?;
            if options.debug {
                table_names.truncate(DEBUG_TABLE_LIMIT);
            }

            let mut user_tables = UserTables::new();
            for table in table_names {
                let entry = Self::get_table(&client, &user, &table).await?;
                user_tables.insert(table, entry);
            }

            inventory.insert(user, user_tables);
        }

        info!(
            "Captured inventory with {} users, {} tables in {:?}",
            inventory.len(),
            crate::inventory::table_count(&inventory),
            started.elapsed()
        );

        Ok(inventory)
    }

    /// Schemas owned by database users, excluding system schemas
    async fn get_users(client: &Client) -> Result<Vec<String>, AppError> {
        let query = r#"
            SELECT s.schema_name::text AS schema_name
            FROM information_schema.schemata s
            WHERE s.schema_name NOT IN ('pg_catalog', 'information_schema')
              AND s.schema_name NOT LIKE 'pg_toast%'
              AND s.schema_name NOT LIKE 'pg_temp%'
            ORDER BY s.schema_name
        "#;

        let rows = client.query(query, &[]).await?;
        Ok(rows.iter().map(|row| row.get("schema_name")).collect())
    }

    async fn get_tables(client: &Client, user: &str) -> Result<Vec<String>, AppError> {
        let query = r#"
            SELECT t.table_name::text AS table_name
            FROM information_schema.tables t
            WHERE t.table_schema = $1
              AND t.table_type = 'BASE TABLE'
            ORDER BY t.table_name
        "#;

        let rows = client.query(query, &[&user]).await?;
        Ok(rows.iter().map(|row| row.get("table_name")).collect())
    }

    async fn get_table(client: &Client, user: &str, table: &str) -> Result<TableEntry, AppError> {
        Ok(TableEntry {
            fields: Self::get_fields(client, user, table).await?,
            privileges: Self::get_privileges(client, user, table).await?,
            indexes: Self::get_indexes(client, user, table).await?,
            row_count: Some(Self::get_row_count(client, user, table).await?),
            extra: Map::new(),
        })
    }

    /// Columns keyed by upper-cased name
    async fn get_fields(
        client: &Client,
        user: &str,
        table: &str,
    ) -> Result<BTreeMap<String, FieldAttrs>, AppError> {
        let query = r#"
            SELECT
                c.column_name::text AS column_name,
                c.data_type::text AS data_type,
                c.is_nullable::text AS is_nullable,
                c.column_default::text AS column_default,
                COALESCE(c.character_maximum_length, c.numeric_precision)::int8 AS length
            FROM information_schema.columns c
            WHERE c.table_schema = $1 AND c.table_name = $2
            ORDER BY c.ordinal_position
        "#;

        let rows = client.query(query, &[&user, &table]).await?;

        let fields = rows
            .iter()
            .map(|row| {
                let name: String = row.get("column_name");
                let mut attrs = FieldAttrs::new(row.get::<_, String>("data_type"), row.get("length"));
                attrs.extra.insert(
                    "nullable".to_string(),
                    json!(row.get::<_, String>("is_nullable") == "YES"),
                );
                attrs.extra.insert(
                    "default".to_string(),
                    json!(row.get::<_, Option<String>>("column_default")),
                );
                (name.to_uppercase(), attrs)
            })
            .collect();

        Ok(fields)
    }

    /// Grants as `GRANTEE:PRIVILEGE` tokens
    async fn get_privileges(
        client: &Client,
        user: &str,
        table: &str,
    ) -> Result<BTreeSet<String>, AppError> {
        let query = r#"
            SELECT g.grantee::text AS grantee, g.privilege_type::text AS privilege_type
            FROM information_schema.role_table_grants g
            WHERE g.table_schema = $1 AND g.table_name = $2
        "#;

        let rows = client.query(query, &[&user, &table]).await?;

        Ok(rows
            .iter()
            .map(|row| {
                format!(
                    "{}:{}",
                    row.get::<_, String>("grantee"),
                    row.get::<_, String>("privilege_type")
                )
            })
            .collect())
    }

    async fn get_indexes(
        client: &Client,
        user: &str,
        table: &str,
    ) -> Result<BTreeMap<String, IndexAttrs>, AppError> {
        let query = r#"
            SELECT
                i.relname::text AS index_name,
                COALESCE(array_agg(a.attname::text ORDER BY array_position(ix.indkey::int2[], a.attnum)), ARRAY[]::text[]) AS columns,
                ix.indisunique AS is_unique,
                ix.indisprimary AS is_primary,
                am.amname::text AS index_type
            FROM pg_class t
            JOIN pg_index ix ON t.oid = ix.indrelid
            JOIN pg_class i ON i.oid = ix.indexrelid
            JOIN pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_am am ON i.relam = am.oid
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE n.nspname = $1 AND t.relname = $2
            GROUP BY i.relname, ix.indisunique, ix.indisprimary, am.amname
            ORDER BY i.relname
        "#;

        let rows = client.query(query, &[&user, &table]).await?;

        let indexes = rows
            .iter()
            .map(|row| {
                let name: String = row.get("index_name");
                let columns: Vec<String> = row.get("columns");
                let mut attrs = IndexAttrs::new(columns.into_iter().map(|c| c.to_uppercase()));
                attrs.extra.insert("unique".to_string(), json!(row.get::<_, bool>("is_unique")));
                attrs.extra.insert("primary".to_string(), json!(row.get::<_, bool>("is_primary")));
                attrs.extra.insert("type".to_string(), json!(row.get::<_, String>("index_type")));
                (name, attrs)
            })
            .collect();

        Ok(indexes)
    }

    async fn get_row_count(client: &Client, user: &str, table: &str) -> Result<i64, AppError> {
        let query = format!(
            "SELECT count(*) AS row_count FROM {}.{}",
            quote_ident(user),
            quote_ident(table)
        );
        let row = client.query_one(query.as_str(), &[]).await?;
        Ok(row.get("row_count"))
    }
}

/// Quote an identifier for interpolation into SQL
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("parcels"), "\"parcels\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_default_capture_options_keep_everything() {
        let options = CaptureOptions::default();
        assert!(!options.debug);
        assert!(options.users.include.is_empty());
        assert!(options.users.exclude.is_empty());
    }
}
