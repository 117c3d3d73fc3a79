//! SD-020: CLI subcommands: show, find, edit.

use crate::core::client::RecordClient;
use crate::core::config::{self, ClientConfig, Overrides};
use crate::core::record::TrackedRecord;
use crate::core::types::{Field, FieldKind, Format, Mode};
use clap::{Args, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Connection options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Provisioning API URL [default: http://localhost/cobbler_api]
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Retries after a failed attempt [default: 5]
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// YAML config file (url, max_retries, timeouts)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a system record
    Show {
        /// System key, or hostname when it contains a dot
        id: String,

        /// Output format
        #[arg(long, value_enum, default_value = "pretty")]
        format: ShowFormat,
    },

    /// List system keys matching a hostname
    Find {
        #[arg(long)]
        hostname: String,
    },

    /// Print the edit command that applies the given field changes
    Edit {
        /// System key, or hostname when it contains a dot
        id: String,

        /// Comment entries (JSON object or key=value pairs)
        #[arg(long)]
        comment: Option<String>,

        /// Kickstart metadata (JSON object or key=value pairs)
        #[arg(long)]
        ks_meta: Option<String>,

        /// Management classes (JSON array or space-separated names)
        #[arg(long)]
        mgmt_classes: Option<String>,

        /// Replace field values instead of merging into them
        #[arg(long)]
        replace: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    Json,
    Pretty,
}

/// Initialize stderr logging. `RUST_LOG` wins over the verbosity flag.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "sysdelta=debug" } else { "sysdelta=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands, conn: &ConnectionArgs) -> Result<(), String> {
    let config = load_config(conn)?;
    match cmd {
        Commands::Show { id, format } => cmd_show(&config, &id, format),
        Commands::Find { hostname } => cmd_find(&config, &hostname),
        Commands::Edit {
            id,
            comment,
            ks_meta,
            mgmt_classes,
            replace,
        } => {
            let updates = [
                (Field::Comment, comment),
                (Field::KsMeta, ks_meta),
                (Field::MgmtClasses, mgmt_classes),
            ];
            let mode = if replace { Mode::Replace } else { Mode::Merge };
            cmd_edit(&config, &id, &updates, mode)
        }
    }
}

fn load_config(conn: &ConnectionArgs) -> Result<ClientConfig, String> {
    let overrides = Overrides {
        url: conn.url.clone(),
        max_retries: conn.max_retries,
    };
    ClientConfig::resolve(
        conn.config.as_deref(),
        std::env::var(config::URL_ENV).ok(),
        &overrides,
    )
    .map_err(|e| e.to_string())
}

fn fetch(config: &ClientConfig, id: &str) -> Result<TrackedRecord, String> {
    let mut client = RecordClient::from_config(config).map_err(|e| e.to_string())?;
    client
        .resolve(id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("system '{}' not found at {}", id, config.url))
}

fn cmd_show(config: &ClientConfig, id: &str, format: ShowFormat) -> Result<(), String> {
    let record = fetch(config, id)?;
    let mapping = Value::Object(record.to_mapping());
    let text = match format {
        ShowFormat::Json => mapping.to_string(),
        ShowFormat::Pretty => serde_json::to_string_pretty(&mapping)
            .map_err(|e| format!("JSON serialize error: {}", e))?,
    };
    println!("{}", text);
    Ok(())
}

fn cmd_find(config: &ClientConfig, hostname: &str) -> Result<(), String> {
    let mut client = RecordClient::from_config(config).map_err(|e| e.to_string())?;
    let keys = client
        .find(&json!({ "hostname": hostname }))
        .map_err(|e| e.to_string())?;
    if keys.is_empty() {
        return Err(format!("no system matches hostname '{}'", hostname));
    }
    for key in keys {
        println!("{}", key);
    }
    Ok(())
}

fn cmd_edit(
    config: &ClientConfig,
    id: &str,
    updates: &[(Field, Option<String>)],
    mode: Mode,
) -> Result<(), String> {
    let mut record = fetch(config, id)?;
    apply_updates(&mut record, updates, mode)?;

    let cmd = record.emit_edit();
    if cmd.is_noop() {
        println!("No changes for {}.", record.name().unwrap_or(id));
    } else {
        println!("{}", cmd);
    }
    Ok(())
}

/// Apply command-line field arguments to a record.
pub fn apply_updates(
    record: &mut TrackedRecord,
    updates: &[(Field, Option<String>)],
    mode: Mode,
) -> Result<(), String> {
    for (field, arg) in updates {
        if let Some(text) = arg {
            let input = parse_field_arg(*field, text)?;
            record.update(*field, &input, mode, Format::Native);
        }
    }
    Ok(())
}

/// Interpret a field argument: JSON text, or the shorthand for the field's kind.
pub fn parse_field_arg(field: Field, text: &str) -> Result<Value, String> {
    if let Ok(v @ (Value::Object(_) | Value::Array(_))) = serde_json::from_str::<Value>(text) {
        return Ok(v);
    }
    match field.kind() {
        FieldKind::List => Ok(json!(text.split_whitespace().collect::<Vec<_>>())),
        FieldKind::Text | FieldKind::Map => {
            let mut map = serde_json::Map::new();
            for pair in text.split_whitespace() {
                let (k, v) = pair.split_once('=').ok_or_else(|| {
                    format!("--{}: expected key=value, got '{}'", field.flag(), pair)
                })?;
                map.insert(k.to_string(), Value::String(v.to_string()));
            }
            Ok(Value::Object(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web01() -> TrackedRecord {
        let raw = json!({"name": "web01", "ks_meta": {"tree": "t"}, "mgmt_classes": ["base"]});
        TrackedRecord::from_mapping(raw.as_object().unwrap())
    }

    #[test]
    fn test_sd020_parse_map_shorthand() {
        assert_eq!(
            parse_field_arg(Field::KsMeta, "a=1 b=x=y").unwrap(),
            json!({"a": "1", "b": "x=y"})
        );
        assert!(parse_field_arg(Field::KsMeta, "novalue")
            .unwrap_err()
            .contains("--ksmeta"));
    }

    #[test]
    fn test_sd020_parse_list_shorthand() {
        assert_eq!(
            parse_field_arg(Field::MgmtClasses, "web db").unwrap(),
            json!(["web", "db"])
        );
    }

    #[test]
    fn test_sd020_parse_json() {
        assert_eq!(
            parse_field_arg(Field::Comment, r#"{"note":"a b"}"#).unwrap(),
            json!({"note": "a b"})
        );
        assert_eq!(parse_field_arg(Field::MgmtClasses, r#"["x"]"#).unwrap(), json!(["x"]));
    }

    #[test]
    fn test_sd020_apply_updates_merge() {
        let mut r = web01();
        let updates = [
            (Field::Comment, None),
            (Field::KsMeta, Some("lang=en".to_string())),
            (Field::MgmtClasses, Some("web".to_string())),
        ];
        apply_updates(&mut r, &updates, Mode::Merge).unwrap();
        assert_eq!(
            r.emit_edit().to_string(),
            "cobbler system edit --name web01 --ksmeta 'tree=t lang=en' --mgmt-classes 'base web'"
        );
    }

    #[test]
    fn test_sd020_apply_updates_replace() {
        let mut r = web01();
        let updates = [
            (Field::KsMeta, Some("tree=t".to_string())),
            (Field::MgmtClasses, Some("db".to_string())),
        ];
        apply_updates(&mut r, &updates, Mode::Replace).unwrap();
        assert_eq!(
            r.emit_edit().to_string(),
            "cobbler system edit --name web01 --mgmt-classes 'db'"
        );
    }

    #[test]
    fn test_sd020_show_mapping_keeps_prose_comment() {
        let raw = json!({"name": "web01", "comment": "rack 4, owned by ops"});
        let mut r = TrackedRecord::from_mapping(raw.as_object().unwrap());
        assert_eq!(
            Value::Object(r.to_mapping())["comment"],
            json!("rack 4, owned by ops")
        );
        let updates = [(Field::Comment, Some("note=x".to_string()))];
        apply_updates(&mut r, &updates, Mode::Merge).unwrap();
        assert_eq!(
            r.emit_edit().to_string(),
            r#"cobbler system edit --name web01 --comment '{"note":"x"}'"#
        );
    }

    #[test]
    fn test_sd020_invalid_url_message() {
        let conn = ConnectionArgs {
            url: Some("not a url".into()),
            max_retries: None,
            config: None,
        };
        let find = Commands::Find {
            hostname: "h.example.com".into(),
        };
        let err = dispatch(find, &conn).unwrap_err();
        assert_eq!(err, "'not a url' is not a valid URL.");
    }
}
