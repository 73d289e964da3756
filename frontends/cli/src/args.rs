use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use docbind::CollectionOptions;

pub const USAGE: &str = "\
usage: docbind-cli --fixture <file.json> [--config <file.yaml>] [--options <json>] [--doc <id>] [--timeout-ms <n>] <collection>

Mounts one binding on an in-memory store seeded from the fixture, prints the
settled {data, loading} envelope as JSON and unmounts.

  --fixture, -f   JSON object {\"<collection>\": {\"<id>\": {<fields>}}}
  --config, -c    YAML config (default: $DOCBIND_CONFIG, ~/.config/docbind/config.yaml)
  --options, -o   collection options, e.g. '{\"where\":[[\"category\",\"==\",\"Cleaning\"]],\"limit\":10}'
  --doc, -d       bind a single document of <collection> instead of a query
  --timeout-ms    how long to wait for the first snapshot (default 5000)";

/// What to mount.
#[derive(Debug, Clone, PartialEq)]
pub enum Mount {
    Collection(Option<CollectionOptions>),
    Doc(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub fixture: PathBuf,
    pub path: String,
    pub mount: Mount,
    pub timeout: Duration,
}

impl CliArgs {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let mut config = None;
        let mut fixture = None;
        let mut options = None;
        let mut doc = None;
        let mut path = None;
        let mut timeout = Duration::from_millis(5000);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => config = Some(PathBuf::from(value_of(&arg, args.next())?)),
                "--fixture" | "-f" => fixture = Some(PathBuf::from(value_of(&arg, args.next())?)),
                "--options" | "-o" => {
                    let json = value_of(&arg, args.next())?;
                    let parsed: CollectionOptions = serde_json::from_str(&json)
                        .map_err(|e| anyhow::anyhow!("Invalid --options JSON: {}", e))?;
                    options = Some(parsed);
                }
                "--doc" | "-d" => doc = Some(value_of(&arg, args.next())?),
                "--timeout-ms" => {
                    let ms = value_of(&arg, args.next())?;
                    let ms: u64 = ms
                        .parse()
                        .map_err(|e| anyhow::anyhow!("Invalid --timeout-ms '{}': {}", ms, e))?;
                    timeout = Duration::from_millis(ms);
                }
                other if other.starts_with('-') => {
                    return Err(anyhow::anyhow!("Unknown flag '{}'", other));
                }
                // Positional argument is the collection path
                _ => path = Some(arg),
            }
        }

        let fixture = fixture.ok_or_else(|| anyhow::anyhow!("--fixture is required"))?;
        let path = path.ok_or_else(|| anyhow::anyhow!("missing <collection> argument"))?;
        let mount = match (doc, options) {
            (Some(_), Some(_)) => {
                return Err(anyhow::anyhow!("--doc and --options cannot be combined"));
            }
            (Some(id), None) => Mount::Doc(id),
            (None, options) => Mount::Collection(options),
        };

        Ok(Self {
            config,
            fixture,
            path,
            mount,
            timeout,
        })
    }
}

fn value_of(flag: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| anyhow::anyhow!("{} expects a value", flag))
}
