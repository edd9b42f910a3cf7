use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{ENV_CONFIG, ENV_DEFAULT_ORDER, ENV_MAX_LIMIT, ENV_VERIFIED_SEALS};

#[derive(Parser)]
#[command(name = "apiquery")]
#[command(version, about = "Compile API filter parameters into DQL", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Order applied when the request has no @order
    #[arg(long, global = true, env = ENV_DEFAULT_ORDER)]
    pub default_order: Option<String>,

    /// Largest accepted @limit
    #[arg(long, global = true, env = ENV_MAX_LIMIT)]
    pub max_limit: Option<u64>,

    /// Seal ids @verified expands to (comma separated)
    #[arg(long, global = true, env = ENV_VERIFIED_SEALS, value_delimiter = ',')]
    pub verified_seals: Option<Vec<u64>>,
}

/// Parse one `key=value` request parameter
fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid parameter '{}'. Use key=value", s)),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Compile request parameters and print the resulting queries
    Explain {
        /// Entity kind to query (e.g. agent)
        kind: String,

        /// JSON file with the entity schemas
        #[arg(long, short = 's')]
        schema: PathBuf,

        /// JSON file with the current user and known entities (anonymous if omitted)
        #[arg(long, short = 'u')]
        user: Option<PathBuf>,

        /// Request parameters as key=value (e.g. 'id=GT(10)' '@select=id,name')
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub default_order: Option<String>,
    pub max_limit: Option<u64>,
    pub verified_seals: Option<Vec<u64>>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        default_order: cli.default_order,
        max_limit: cli.max_limit,
        verified_seals: cli.verified_seals,
    };
    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("id=GT(10)").unwrap(),
            ("id".to_string(), "GT(10)".to_string())
        );
        assert_eq!(
            parse_param("name=EQ(a=b)").unwrap(),
            ("name".to_string(), "EQ(a=b)".to_string())
        );
        assert_eq!(
            parse_param("@or=").unwrap(),
            ("@or".to_string(), String::new())
        );
        assert!(parse_param("id").is_err());
        assert!(parse_param("=GT(1)").is_err());
    }

    #[test]
    fn test_explain_command() {
        let cli = Cli::try_parse_from([
            "apiquery",
            "explain",
            "agent",
            "--schema",
            "schema.json",
            "--verified-seals",
            "1,2",
            "id=GT(10)",
            "@select=id,name",
        ])
        .unwrap();

        assert_eq!(cli.verified_seals, Some(vec![1, 2]));
        let Commands::Explain {
            kind,
            schema,
            user,
            params,
        } = cli.command;
        assert_eq!(kind, "agent");
        assert_eq!(schema, PathBuf::from("schema.json"));
        assert!(user.is_none());
        assert_eq!(params.len(), 2);
        assert_eq!(params[1], ("@select".to_string(), "id,name".to_string()));
    }
}
