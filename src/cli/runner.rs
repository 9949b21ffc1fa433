//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{Environment, Settings, ENV_VAR};
use crate::error::{Error, Result, ResultExt};
use crate::expression::{Attr, Condition, Key, KeyCondition};
use crate::pagination::Next;
use crate::service::TableService;
use crate::store::{MemoryTable, QueryParams};
use crate::types::{record_from_value, JsonValue, Record, PARTITION_KEY, SORT_KEY};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

/// Arguments of the `query` command
struct QueryArgs<'a> {
    items: &'a Path,
    pk: &'a str,
    sk_prefix: Option<&'a str>,
    index: Option<(&'a str, &'a str, Option<&'a str>)>,
    filters: &'a [String],
    limit: Option<usize>,
    first: bool,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Settings => self.show_settings(),
            Commands::Query {
                items,
                pk,
                sk_prefix,
                index,
                index_pk,
                index_sk,
                filters,
                limit,
                first,
            } => {
                let index = match (index, index_pk) {
                    (Some(name), Some(pk_attr)) => {
                        Some((name.as_str(), pk_attr.as_str(), index_sk.as_deref()))
                    }
                    (Some(name), None) => {
                        return Err(Error::config(format!(
                            "Index '{name}' needs --index-pk"
                        )))
                    }
                    (None, _) => None,
                };
                self.query(QueryArgs {
                    items,
                    pk,
                    sk_prefix: sk_prefix.as_deref(),
                    index,
                    filters,
                    limit: *limit,
                    first: *first,
                })
                .await
            }
        }
    }

    /// Resolve settings from the config file, `--env`, or the process environment.
    /// Only `settings` needs them; `query` runs against an in-memory table.
    fn settings(&self) -> Result<Settings> {
        match (&self.cli.config, self.cli.env) {
            (Some(path), env) => {
                let env = env.unwrap_or_else(|| {
                    Environment::from_name(std::env::var(ENV_VAR).ok().as_deref())
                });
                Settings::from_file(path, env)
            }
            (None, Some(env)) => Settings::from_lookup(|name| {
                if name == ENV_VAR {
                    Some(env.as_str().to_string())
                } else {
                    std::env::var(name).ok()
                }
            }),
            (None, None) => Settings::from_env(),
        }
    }

    fn show_settings(&self) -> Result<()> {
        let settings = self.settings()?;
        self.output_value(&serde_json::to_value(&settings)?);
        Ok(())
    }

    async fn query(&self, args: QueryArgs<'_>) -> Result<()> {
        let records = load_items(args.items)?;

        let mut table = MemoryTable::new();
        let (pk_attr, sk_attr) = match args.index {
            Some((name, index_pk, index_sk)) => {
                table = table.with_index(name, index_pk, index_sk);
                (index_pk, index_sk)
            }
            None => (PARTITION_KEY, Some(SORT_KEY)),
        };
        let table = table.with_items(records)?;
        let service = TableService::new(Arc::new(table));

        let key_condition = build_key_condition(pk_attr, sk_attr, args.pk, args.sk_prefix)?;
        let filter = TableService::combine_filters(
            args.filters
                .iter()
                .map(|f| parse_filter(f))
                .collect::<Result<Vec<_>>>()?,
        );

        let mut params = QueryParams::new()
            .key_condition(key_condition)
            .maybe_filter(filter);
        if let Some((name, _, _)) = args.index {
            params = params.index(name);
        }
        if let Some(limit) = args.limit {
            params = params.limit(limit);
        }

        let mut iter = service.db_iterator(params);
        if args.first {
            if let Some(record) = iter.first_or_default().await? {
                self.output_record(record);
            }
        } else {
            while let Next::Record(record) = iter.produce_next().await? {
                self.output_record(record);
            }
        }

        info!(
            "Read {} records in {} pages",
            iter.records_yielded(),
            iter.pages_fetched()
        );
        Ok(())
    }

    fn output_record(&self, record: Record) {
        self.output_value(&JsonValue::Object(record));
    }

    /// Output a value
    fn output_value(&self, value: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(value).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
            }
        }
    }
}

/// Read a JSON array of items
fn load_items(path: &Path) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read items file '{}'", path.display()))?;
    let items: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse items file '{}'", path.display()))?;
    match items {
        Value::Array(items) => items.into_iter().map(record_from_value).collect(),
        _ => Err(Error::config("Items file must contain a JSON array")),
    }
}

fn build_key_condition(
    pk_attr: &str,
    sk_attr: Option<&str>,
    pk: &str,
    sk_prefix: Option<&str>,
) -> Result<KeyCondition> {
    let condition = Key::new(pk_attr).eq(pk);
    match (sk_prefix, sk_attr) {
        (None, _) => Ok(condition),
        (Some(prefix), Some(sk_attr)) => Ok(condition.and(Key::new(sk_attr).begins_with(prefix))),
        (Some(_), None) => Err(Error::config("--sk-prefix needs a sort key (--index-sk)")),
    }
}

/// Parse `attr=value`. The value is read as JSON when it parses, else as a string.
fn parse_filter(filter: &str) -> Result<Condition> {
    let (attr, raw) = filter
        .split_once('=')
        .ok_or_else(|| Error::config(format!("Filter '{filter}' must look like attr=value")))?;
    let attr = attr.trim();
    if attr.is_empty() {
        return Err(Error::config(format!("Filter '{filter}' has no attribute name")));
    }
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok(Attr::new(attr).eq(value))
}
