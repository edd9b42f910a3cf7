//! Core application

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::cli::{self, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::data::{Anonymous, ReferenceResolver, SchemaRegistry, StaticReferences};
use crate::query::{ApiQuery, QueryPlan, RawQuery, RenderedQuery};

pub struct CoreApp {
    pub config: AppConfig,
}

/// Everything `explain` prints for one compiled request
#[derive(Debug, Serialize)]
pub struct Explanation {
    pub find: RenderedQuery,
    pub count: RenderedQuery,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    pub sub_selects: Vec<SubSelectExplanation>,
}

#[derive(Debug, Serialize)]
pub struct SubSelectExplanation {
    pub token: String,
    pub dql: String,
}

impl Explanation {
    pub fn from_plan(plan: &QueryPlan) -> Self {
        let sub_selects = plan
            .sub_selects()
            .iter()
            .filter_map(|sub| {
                plan.sub_select_dql(&sub.token)
                    .map(|dql| SubSelectExplanation {
                        token: sub.token.clone(),
                        dql,
                    })
            })
            .collect();

        Self {
            find: plan.find(),
            count: plan.count(),
            metadata: plan.metadata_dql(),
            sub_selects,
        }
    }
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self {
            config: AppConfig::load(&cli_config)?,
        };

        match command {
            Commands::Explain {
                kind,
                schema,
                user,
                params,
            } => {
                let raw: RawQuery = params.into_iter().collect();
                let explanation = app.explain(&kind, &schema, user.as_deref(), &raw)?;
                let json = serde_json::to_string_pretty(&explanation)
                    .context("Failed to serialize explanation")?;
                println!("{}", json);
                Ok(())
            }
        }
    }

    /// Compile `raw` against the schema file and render every query of the plan
    pub fn explain(
        &self,
        kind: &str,
        schema_path: &Path,
        user_path: Option<&Path>,
        raw: &RawQuery,
    ) -> Result<Explanation> {
        let schemas = SchemaRegistry::load_from_file(schema_path).with_context(|| {
            format!("Failed to load schema file: {}", schema_path.display())
        })?;

        let references: Box<dyn ReferenceResolver> = match user_path {
            Some(path) => Box::new(StaticReferences::load_from_file(path).with_context(|| {
                format!("Failed to load references file: {}", path.display())
            })?),
            None => Box::new(Anonymous),
        };

        let plan = ApiQuery::build(kind, raw, &schemas, references.as_ref(), &self.config.query)
            .map_err(|e| anyhow::anyhow!("{} ({})", e, e.code()))?;

        Ok(Explanation::from_plan(&plan))
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }
}
