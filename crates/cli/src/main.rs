use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tably_core::{ColumnDefinition, ColumnRegistry, JsonTemplate, Template, TextTemplate};
use tably_query::{CachedSource, DataTable, FetchPolicy, FileSource, QueryRequest};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tablyctl", version, about = "Render sortable tables from a response document")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Log filter, e.g. "info" or "tably_query=debug"
    #[arg(long = "log", env = "TABLY_LOG", global = true, default_value = "info")]
    log: String,

    /// Serve Prometheus metrics on this address (host:port)
    #[arg(long = "metrics-addr", env = "TABLY_METRICS_ADDR", global = true)]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch the response document and render it as a table
    Render(RenderArgs),
    /// Validate column definitions and print the header registry
    Columns {
        /// Column definitions (YAML or JSON list)
        #[arg(long = "columns")]
        columns: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Column definitions (YAML or JSON list)
    #[arg(long = "columns")]
    columns: PathBuf,
    /// Response document (JSON)
    #[arg(long = "data")]
    data: PathBuf,
    /// Path of the row collection inside the response
    #[arg(long = "items-key", default_value = "items")]
    items_key: String,
    /// Content for cells whose path is missing
    #[arg(long = "default-content", default_value = tably_core::DEFAULT_CONTENT)]
    default_content: String,
    /// Click the header of this column (repeatable, applied in order)
    #[arg(long = "sort")]
    sort: Vec<String>,
    /// Request variable receiving the order enum, e.g. "orderBy"
    #[arg(long = "order-var")]
    order_var: Option<String>,
    /// Query text passed to the source
    #[arg(long = "query", default_value = "")]
    query: String,
    /// Request variable as name=value; value is parsed as JSON when possible
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, Value)>,
    /// Fetch policy applied by the response cache in front of the data file
    #[arg(long = "fetch-policy", default_value_t = FetchPolicy::NetworkOnly)]
    fetch_policy: FetchPolicy,
}

/// Log filter from `--log`; an unparsable filter falls back to `info` and is reported.
fn log_filter(spec: &str) -> (EnvFilter, Option<String>) {
    match EnvFilter::try_new(spec) {
        Ok(f) => (f, None),
        Err(e) => (EnvFilter::new("info"), Some(e.to_string())),
    }
}

/// Logs go to stderr so table output on stdout stays clean.
fn init_observability(cli: &Cli) {
    let (filter, bad_filter) = log_filter(&cli.log);
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    if let Some(e) = bad_filter {
        warn!(filter = %cli.log, error = %e, "invalid log filter; using info");
    }
    if let Some(addr) = cli.metrics_addr {
        match metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr).install() {
            Ok(()) => info!(%addr, "metrics exporter listening"),
            Err(e) => warn!(%addr, error = %e, "metrics exporter not installed"),
        }
    }
}

fn parse_var(s: &str) -> Result<(String, Value), String> {
    let (name, raw) = s.split_once('=').ok_or_else(|| format!("expected name=value, got `{}`", s))?;
    if name.is_empty() {
        return Err(format!("empty variable name in `{}`", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

/// Load column definitions; `.yaml`/`.yml` files are read as YAML, anything else as JSON.
fn load_columns(path: &Path) -> Result<Vec<ColumnDefinition>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading columns from {}", path.display()))?;
    let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"));
    let cols = if is_yaml {
        serde_yaml::from_str(&text).with_context(|| format!("parsing YAML columns in {}", path.display()))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("parsing JSON columns in {}", path.display()))?
    };
    Ok(cols)
}

/// Result of one `render` run.
#[derive(Debug)]
struct RenderOutcome<O> {
    output: O,
    failed: bool,
    /// Request as sent, after sort clicks wrote the order variable.
    request: QueryRequest,
}

/// Build the table, apply header clicks, fetch once and render.
///
/// The data file sits behind a fresh response cache, so the fetch policy decides
/// whether the file is read at all: `cache-only` always misses.
async fn render_table<T: Template>(args: &RenderArgs, template: T) -> Result<RenderOutcome<T::Output>> {
    let columns = load_columns(&args.columns)?;
    let variables: Map<String, Value> = args.vars.iter().cloned().collect();
    let request = QueryRequest { query: args.query.clone(), variables, fetch_policy: args.fetch_policy };
    let source = CachedSource::new(FileSource::new(&args.data));
    debug!(path = %source.inner().path().display(), policy = %args.fetch_policy, "response source ready");
    let mut table = DataTable::with_columns(source, template, columns, request)?
        .items_key(args.items_key.clone())
        .default_content(Value::String(args.default_content.clone()))
        .with_order_change(|d| info!(column = %d.name, direction = %d.sorted, order = %d.order_enum, "order changed"));
    if let Some(var) = &args.order_var {
        table = table.order_variable(var.clone());
    }

    for name in args.sort.iter() {
        if table.registry().position(name).is_none() {
            bail!("unknown column `{}`", name);
        }
        if table.click_header_by_name(name).is_none() {
            warn!(column = %name, "column is not sortable; click ignored");
        }
    }

    let failed = table.refresh().await.error().is_some();
    Ok(RenderOutcome { output: table.render(), failed, request: table.request().clone() })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_observability(&cli);

    match cli.command {
        Commands::Render(args) => {
            info!(data = %args.data.display(), items_key = %args.items_key, "render invoked");
            let failed = match cli.output {
                Output::Human => {
                    let outcome = render_table(&args, TextTemplate::default()).await?;
                    println!("{}", outcome.output);
                    outcome.failed
                }
                Output::Json => {
                    let outcome = render_table(&args, JsonTemplate).await?;
                    println!("{}", serde_json::to_string_pretty(&outcome.output)?);
                    outcome.failed
                }
            };
            if failed {
                std::process::exit(1);
            }
        }
        Commands::Columns { columns } => {
            let registry = ColumnRegistry::new(load_columns(&columns)?)?;
            let headers = registry.headers();
            match cli.output {
                Output::Human => {
                    println!("{:<5} {:<20} {:<24} SORTABLE", "INDEX", "NAME", "LABEL");
                    for h in headers.iter() {
                        println!("{:<5} {:<20} {:<24} {}", h.index, h.name, h.label, if h.sortable { "yes" } else { "no" });
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&headers)?),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_file(ext: &str, body: &str) -> PathBuf {
        static SEQ: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
        let nanos = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        let seq = SEQ.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("tably-test-{}-{}.{}", nanos, seq, ext));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn parse_var_reads_json_or_falls_back_to_string() {
        assert_eq!(parse_var("first=10").unwrap(), ("first".to_string(), json!(10)));
        assert_eq!(parse_var("where={\"a\":1}").unwrap().1, json!({ "a": 1 }));
        assert_eq!(parse_var("orderBy=price_ASC").unwrap().1, json!("price_ASC"));
        assert_eq!(parse_var("empty=").unwrap().1, json!(""));
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=1").is_err());
    }

    #[test]
    fn load_columns_from_yaml_and_json() {
        let yaml = temp_file(
            "yaml",
            "- name: title\n  label: Title\n  sortable: true\n- name: city\n  label: City\n  content: address.city\n  defaultContent: unknown\n",
        );
        let cols = load_columns(&yaml).unwrap();
        let _ = std::fs::remove_file(&yaml);
        assert_eq!(cols.len(), 2);
        assert!(cols[0].sortable);
        assert_eq!(cols[1].lookup_path(), "address.city");

        let js = temp_file("json", r#"[{ "name": "id", "label": "ID" }]"#);
        let cols = load_columns(&js).unwrap();
        let _ = std::fs::remove_file(&js);
        assert_eq!(cols[0].name, "id");
        assert!(!cols[0].sortable);
    }

    #[tokio::test]
    async fn render_applies_sort_clicks() {
        let cols = temp_file("json", r#"[{ "name": "name", "label": "Name", "sortable": true }, { "name": "age", "label": "Age" }]"#);
        let data = temp_file("json", r#"{ "items": [{ "name": "Ana", "age": 30 }, { "name": "Luis" }] }"#);
        let args = RenderArgs {
            columns: cols.clone(),
            data: data.clone(),
            items_key: "items".into(),
            default_content: "N/A".into(),
            sort: vec!["name".into(), "age".into()],
            order_var: Some("orderBy".into()),
            query: String::new(),
            vars: Vec::new(),
            fetch_policy: FetchPolicy::NetworkOnly,
        };
        let outcome = render_table(&args, TextTemplate::default()).await.unwrap();
        let _ = std::fs::remove_file(&cols);
        let _ = std::fs::remove_file(&data);
        assert!(!outcome.failed);
        assert_eq!(outcome.output.lines().collect::<Vec<_>>(), vec!["Name ↑  Age", "Ana     30", "Luis    N/A"]);
    }

    fn render_args(cols: &Path, data: &Path, policy: FetchPolicy) -> RenderArgs {
        RenderArgs {
            columns: cols.to_path_buf(),
            data: data.to_path_buf(),
            items_key: "items".into(),
            default_content: "N/A".into(),
            sort: Vec::new(),
            order_var: None,
            query: "products".into(),
            vars: Vec::new(),
            fetch_policy: policy,
        }
    }

    #[tokio::test]
    async fn fetch_policy_reaches_the_cache() {
        let cols = temp_file("json", r#"[{ "name": "name", "label": "Name" }]"#);
        let data = temp_file("json", r#"{ "items": [{ "name": "Ana" }] }"#);

        let miss = render_table(&render_args(&cols, &data, FetchPolicy::CacheOnly), JsonTemplate).await.unwrap();
        assert!(miss.failed);
        assert_eq!(miss.output["state"], "error");
        assert_eq!(miss.output["message"], "cache miss for query `products`");

        let hit = render_table(&render_args(&cols, &data, FetchPolicy::CacheFirst), JsonTemplate).await.unwrap();
        let _ = std::fs::remove_file(&cols);
        let _ = std::fs::remove_file(&data);
        assert!(!hit.failed);
        assert_eq!(hit.output["rows"], json!([["Ana"]]));
    }

    #[tokio::test]
    async fn vars_and_order_variable_shape_the_request() {
        let cols = temp_file("json", r#"[{ "name": "price", "label": "Price", "sortable": true }]"#);
        let data = temp_file("json", r#"{ "items": [] }"#);
        let mut args = render_args(&cols, &data, FetchPolicy::NoCache);
        args.vars = vec![("first".into(), json!(10)), ("orderBy".into(), json!("junk"))];
        args.order_var = Some("orderBy".into());
        args.sort = vec!["price".into(), "price".into()];

        let outcome = render_table(&args, JsonTemplate).await.unwrap();
        let _ = std::fs::remove_file(&cols);
        let _ = std::fs::remove_file(&data);
        assert_eq!(outcome.request.query, "products");
        assert_eq!(outcome.request.fetch_policy, FetchPolicy::NoCache);
        assert_eq!(outcome.request.variables["first"], json!(10));
        assert_eq!(outcome.request.variables["orderBy"], json!("price_DESC"));
        assert_eq!(outcome.output["order"], "price_DESC");
    }

    #[test]
    fn observability_flags_parse_from_args() {
        let cli = Cli::try_parse_from([
            "tablyctl",
            "columns",
            "--columns",
            "c.yaml",
            "--log",
            "tably_query=debug",
            "--metrics-addr",
            "127.0.0.1:9100",
        ])
        .unwrap();
        assert_eq!(cli.log, "tably_query=debug");
        assert_eq!(cli.metrics_addr, Some("127.0.0.1:9100".parse().unwrap()));
        assert!(Cli::try_parse_from(["tablyctl", "columns", "--columns", "c.yaml", "--metrics-addr", "nope"]).is_err());
    }

    #[test]
    fn bad_log_filter_falls_back() {
        assert!(log_filter("tably_core=trace").1.is_none());
        assert!(log_filter("tably_core=loud").1.is_some());
    }

    #[tokio::test]
    async fn render_rejects_unknown_sort_column() {
        let cols = temp_file("json", r#"[{ "name": "name", "label": "Name", "sortable": true }]"#);
        let args = RenderArgs {
            columns: cols.clone(),
            data: PathBuf::from("unused.json"),
            items_key: "items".into(),
            default_content: "N/A".into(),
            sort: vec!["price".into()],
            order_var: None,
            query: String::new(),
            vars: Vec::new(),
            fetch_policy: FetchPolicy::default(),
        };
        let err = render_table(&args, JsonTemplate).await.unwrap_err();
        let _ = std::fs::remove_file(&cols);
        assert!(err.to_string().contains("unknown column `price`"));
    }
}
