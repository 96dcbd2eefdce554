use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "ATTENDD_WORKSPACE";
pub const LOG_FILTER_ENV: &str = "ATTENDD_LOG";
const DEFAULT_LOG_FILTER: &str = "info";

/// Startup settings: `--workspace <dir>` wins over `ATTENDD_WORKSPACE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        Config::from_parts(
            std::env::args().skip(1),
            std::env::var(WORKSPACE_ENV).ok(),
            std::env::var(LOG_FILTER_ENV).ok(),
        )
    }

    pub fn from_parts(
        args: impl IntoIterator<Item = String>,
        workspace_env: Option<String>,
        log_env: Option<String>,
    ) -> anyhow::Result<Config> {
        let mut workspace = None;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--workspace" => {
                    let v = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--workspace needs a directory"))?;
                    workspace = Some(PathBuf::from(v));
                }
                other => {
                    if let Some(v) = other.strip_prefix("--workspace=") {
                        workspace = Some(PathBuf::from(v));
                    } else {
                        anyhow::bail!("unknown argument: {other}");
                    }
                }
            }
        }
        let workspace = workspace.or_else(|| {
            workspace_env
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        });
        let log_filter = log_env
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        Ok(Config {
            workspace,
            log_filter,
        })
    }
}
