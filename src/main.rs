use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sql_index_advisor::advisor::{
    self, apply_statements, deploy_artifact, execute_artifact, index_context, persist_artifact,
    persist_maintenance, readable_procedures, save_rewrite, SaveOptions, SaveOutcome,
};
use sql_index_advisor::parser::{self, extract_tables, read_sql_file, sanitize_procedure, DEFAULT_SCHEMA};
use sql_index_advisor::source::{FileSink, SqlServerClient};
use sql_index_advisor::verify::compare;
use sql_index_advisor::{
    build_recommendation, AssembleOutcome, BuildOptions, ConnectionSettings, MetadataSource, Thresholds,
};

#[derive(Parser)]
#[command(name = "sql-index-advisor")]
#[command(author, version, about = "Index maintenance and advisory engine for SQL Server")]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tables referenced by a SQL file, or every table of the configured database
    Tables {
        /// Path to the .sql file; without it the database catalog is listed
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Database used to resolve one- and two-part names
        #[arg(short, long)]
        database: Option<String>,
    },

    /// List the stored procedures of the configured database that can be read
    Procedures,

    /// Compare a rewritten procedure with the original
    Verify {
        #[arg(long)]
        original: PathBuf,

        #[arg(long)]
        rewritten: PathBuf,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },

    /// Scan fragmentation and index usage, print the recommendations
    Analyze {
        /// Execute the maintenance statements now
        #[arg(long)]
        apply: bool,

        /// Scan every user database
        #[arg(long)]
        all_databases: bool,

        /// Save the maintenance script into this folder
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },

    /// Print the prompt context for a stored procedure
    Context {
        /// Procedure as schema.name (schema defaults to dbo)
        #[arg(short, long)]
        procedure: String,
    },

    /// Assemble the recommendation procedure
    Build {
        /// File with generated index suggestions
        #[arg(long)]
        ai_sql: Option<PathBuf>,

        /// Include the suggestions from --ai-sql
        #[arg(long)]
        use_ai: bool,

        /// Save the deployment script into this folder
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Deploy the procedure to the configured database
        #[arg(long)]
        deploy: bool,

        /// Scan every user database
        #[arg(long)]
        all_databases: bool,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },

    /// Run the deployed recommendation procedure
    Execute,

    /// Create a verified rewrite of a procedure next to the original
    SaveRewrite {
        /// Original procedure as schema.name
        #[arg(short, long)]
        procedure: String,

        /// File with the rewritten procedure (raw generated text is accepted)
        #[arg(short, long)]
        rewritten: PathBuf,

        /// Save even when the rewrite is below the similarity threshold
        #[arg(long)]
        force: bool,

        /// Also write the rewrite into this folder
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
}

/// Overrides for the policy thresholds
#[derive(Args, Debug, Default)]
struct ThresholdArgs {
    /// Fragmentation percent that calls for REBUILD
    #[arg(long)]
    rebuild_percent: Option<f64>,

    /// Fragmentation percent that calls for REORGANIZE
    #[arg(long)]
    reorganize_percent: Option<f64>,

    /// Indexes with this many pages or fewer are skipped
    #[arg(long)]
    min_page_count: Option<i64>,

    /// Reads below this mark a written index as LOW_READ
    #[arg(long)]
    low_read: Option<i64>,

    /// Seeks a missing index needs to be recommended
    #[arg(long)]
    missing_min_seeks: Option<i64>,

    /// Average impact a missing index needs to be recommended
    #[arg(long)]
    missing_min_impact: Option<f64>,

    /// Similarity ratio a rewrite must reach
    #[arg(long)]
    threshold: Option<f64>,
}

impl ThresholdArgs {
    fn resolve(&self) -> Thresholds {
        let defaults = Thresholds::default();
        Thresholds {
            rebuild_percent: self.rebuild_percent.unwrap_or(defaults.rebuild_percent),
            reorganize_percent: self.reorganize_percent.unwrap_or(defaults.reorganize_percent),
            min_page_count: self.min_page_count.unwrap_or(defaults.min_page_count),
            low_read: self.low_read.unwrap_or(defaults.low_read),
            missing_min_seeks: self.missing_min_seeks.unwrap_or(defaults.missing_min_seeks),
            missing_min_impact: self.missing_min_impact.unwrap_or(defaults.missing_min_impact),
            similarity: self.threshold.unwrap_or(defaults.similarity),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn connect() -> Result<(SqlServerClient, String)> {
    let settings = ConnectionSettings::from_env()?;
    let database = settings.database.clone();
    Ok((SqlServerClient::new(settings)?, database))
}

fn split_procedure_name(qualified: &str) -> (String, String) {
    let trimmed = qualified.trim();
    match trimmed.split_once('.') {
        Some((schema, name)) => (
            sql_index_advisor::util::strip_brackets(schema),
            sql_index_advisor::util::strip_brackets(name),
        ),
        None => (
            DEFAULT_SCHEMA.to_string(),
            sql_index_advisor::util::strip_brackets(trimmed),
        ),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Tables {
            file: Some(file),
            database,
        } => {
            let sql = read_sql_file(&file)?;
            for table in extract_tables(&sql, database.as_deref()) {
                println!("{}", table);
            }
        }

        Commands::Tables { file: None, database } => {
            let (client, configured) = connect()?;
            let database = database.unwrap_or(configured);
            for table in client.list_tables(&database)? {
                println!("{}", table);
            }
        }

        Commands::Procedures => {
            let (client, database) = connect()?;
            for procedure in readable_procedures(&client, &database)? {
                println!("{}", procedure.qualified_name());
            }
        }

        Commands::Verify {
            original,
            rewritten,
            thresholds,
        } => {
            let threshold = thresholds.resolve().similarity;
            let original = read_sql_file(&original)?;
            let rewritten = read_sql_file(&rewritten)?;
            let verdict = compare(&original, &rewritten, threshold);
            println!("ratio: {:.4}", verdict.ratio);
            println!("similar: {}", verdict.is_similar);
            if !verdict.is_similar {
                bail!(
                    "rewrite is too different from the original ({:.4} < {})",
                    verdict.ratio,
                    threshold
                );
            }
        }

        Commands::Analyze {
            apply,
            all_databases,
            out,
            thresholds,
        } => {
            let thresholds = thresholds.resolve();
            let (client, database) = connect()?;
            let databases = advisor::target_databases(&client, &database, all_databases)?;
            let report = advisor::analyze(&client, &databases, &thresholds);

            println!("-- Fragmentation ({} indexes)", report.maintenance.len());
            for rec in &report.maintenance {
                println!(
                    "{}.{}.{} {}: {:.2}% over {} pages -> {}",
                    rec.database,
                    rec.schema,
                    rec.table,
                    rec.index,
                    rec.fragmentation_percent,
                    rec.page_count,
                    rec.action
                );
            }
            println!("\n-- Index usage ({} recommendations)", report.unused.len() + report.missing.len());
            for rec in report.prioritized() {
                println!("{} {}", rec.action_label(), rec.suggested_sql().unwrap_or("-"));
            }

            let maintenance_sql = report.maintenance_sql();
            if !maintenance_sql.is_empty() {
                println!("\n{}", maintenance_sql);
            }
            for failure in &report.failures {
                eprintln!("skipped {}: {}", failure.database, failure.message);
            }

            if let Some(folder) = out {
                if !maintenance_sql.is_empty() {
                    let sink = FileSink::new(folder);
                    let path = persist_maintenance(&sink, &maintenance_sql, chrono::Local::now())?;
                    println!("saved {}", path.display());
                }
            }

            if apply {
                let applied = apply_statements(&client, &database, &maintenance_sql);
                println!("applied {} statements, {} failed", applied.applied, applied.failures.len());
            }
        }

        Commands::Context { procedure } => {
            let (client, database) = connect()?;
            let (schema, name) = split_procedure_name(&procedure);
            let context = index_context(&client, &database, &schema, &name)?;
            println!("-- Tables");
            for table in &context.tables {
                println!("{}", table);
            }
            println!("\n-- Table info\n{}", context.table_info_text());
            println!("\n-- Prompt\n{}", context.index_prompt());
            for failure in &context.failures {
                eprintln!("skipped {}", failure);
            }
        }

        Commands::Build {
            ai_sql,
            use_ai,
            out,
            deploy,
            all_databases,
            thresholds,
        } => {
            let (client, database) = connect()?;
            let options = BuildOptions {
                database: database.clone(),
                all_databases,
                ai_sql,
                use_ai,
                thresholds: thresholds.resolve(),
            };
            let artifact = match build_recommendation(&client, &options)? {
                AssembleOutcome::Built(artifact) => artifact,
                AssembleOutcome::NothingToBuild => {
                    println!("No recommendations to build.");
                    return Ok(());
                }
            };

            match out {
                Some(folder) => {
                    let path = persist_artifact(&FileSink::new(folder), &artifact, Some(&database))?;
                    println!("saved {}", path.display());
                }
                None => println!("{}", artifact.to_script(Some(&database))),
            }

            if deploy {
                deploy_artifact(&client, &database, &artifact)?;
            }
        }

        Commands::Execute => {
            let (client, database) = connect()?;
            execute_artifact(&client, &database)?;
        }

        Commands::SaveRewrite {
            procedure,
            rewritten,
            force,
            out,
            thresholds,
        } => {
            let (client, database) = connect()?;
            let (schema, name) = split_procedure_name(&procedure);
            let original = client
                .procedure_definition(&database, &schema, &name)?
                .ok_or_else(|| sql_index_advisor::AdvisorError::ProcedureNotFound {
                    database: database.clone(),
                    schema: schema.clone(),
                    name: name.clone(),
                })?;
            let raw = read_sql_file(&rewritten)?;
            let section = parser::section_after(&raw, parser::SP_OPTIMIZED_MARKER).unwrap_or(raw);
            let rewritten = sanitize_procedure(&section);

            let sink = out.map(FileSink::new);
            let options = SaveOptions {
                threshold: thresholds.resolve().similarity,
                force,
            };
            let outcome = save_rewrite(
                &client,
                sink.as_ref().map(|s| s as &dyn sql_index_advisor::ArtifactSink),
                &database,
                &original,
                &rewritten,
                options,
                chrono::Local::now(),
            )?;
            match outcome {
                SaveOutcome::Saved { name, verdict, path } => {
                    println!("saved dbo.{} (ratio {:.4})", name, verdict.ratio);
                    if let Some(path) = path {
                        println!("wrote {}", path.display());
                    }
                }
                SaveOutcome::NoOp(_) => println!("rewrite is identical to the original; nothing saved"),
                SaveOutcome::Rejected(verdict) => bail!(
                    "rewrite rejected: similarity {:.4} is below {} (use --force to save anyway)",
                    verdict.ratio,
                    options.threshold
                ),
            }
        }
    }

    Ok(())
}
