//! Operator CLI for the tenant schema lifecycle: registering and deleting
//! tenants, provisioning schemas, and driving migrations per schema.

use clap::{Args, Parser, Subcommand, ValueEnum};
use core_lib::adapters::record_cache::TenantRecordCache;
use core_lib::config::{DatabaseConfig, TenancyConfig};
use core_lib::domain::tenant::{NewTenant, TenantType};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::sync::Arc;
use tenancy::connections::{PgPoolFactory, SchemaConnections};
use tenancy::ddl::SchemaDdl;
use tenancy::migrate::MigrationRunner;
use tenancy::naming::{COMMON_SCHEMA, SYS_SCHEMA, SchemaClass, validate_schema_name};
use tenancy::registry::TenantRegistry;
use tracing::info;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "tenant-cli", about = "Tenant schema lifecycle tooling", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tenant registry operations
    Tenant {
        #[command(subcommand)]
        command: TenantCommand,
    },
    /// Schema-level operations
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
    /// Migration operations against one schema
    Migrate {
        #[command(subcommand)]
        command: MigrateCommand,
    },
    /// Environment bootstrap
    Setup {
        #[command(subcommand)]
        command: SetupCommand,
    },
}

#[derive(Subcommand)]
enum TenantCommand {
    /// Register a tenant (and provision its schema unless --no-provision)
    Create(CreateTenantArgs),
    /// Drop a tenant's schema and remove its registry row. Irreversible.
    Delete {
        /// Tenant domain
        domain: String,
        /// Required confirmation for the destructive drop
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
struct CreateTenantArgs {
    /// Unique tenant domain, e.g. "acme-gym"
    #[arg(long)]
    domain: String,
    /// Display name
    #[arg(long)]
    name: String,
    /// Business category
    #[arg(long, value_enum, default_value_t = TenantTypeArg::Gym)]
    tenant_type: TenantTypeArg,
    /// Contact email stored on the registry row
    #[arg(long)]
    email: Option<String>,
    /// Register the row only; skip schema creation and migrations
    #[arg(long)]
    no_provision: bool,
}

#[derive(Subcommand)]
enum SchemaCommand {
    /// Create (or resume creating) the schema for an existing tenant
    Create {
        /// Tenant domain
        domain: String,
    },
}

#[derive(Subcommand)]
enum MigrateCommand {
    /// Apply pending migrations for a schema
    Run(MigrateArgs),
    /// Revert exactly the most recently applied migration
    Revert(MigrateArgs),
}

#[derive(Args)]
struct MigrateArgs {
    /// Which migration set to use
    #[arg(long, value_enum)]
    class: SchemaClassArg,
    /// Schema name; defaults to the fixed name for sys/common
    #[arg(long)]
    schema: Option<String>,
}

#[derive(Subcommand)]
enum SetupCommand {
    /// Create the sys and common schemas and bring both to head
    Dev,
}

#[derive(Clone, Copy, ValueEnum)]
enum TenantTypeArg {
    Gym,
    Studio,
    PersonalTrainer,
    Enterprise,
}

impl From<TenantTypeArg> for TenantType {
    fn from(arg: TenantTypeArg) -> Self {
        match arg {
            TenantTypeArg::Gym => TenantType::Gym,
            TenantTypeArg::Studio => TenantType::Studio,
            TenantTypeArg::PersonalTrainer => TenantType::PersonalTrainer,
            TenantTypeArg::Enterprise => TenantType::Enterprise,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaClassArg {
    Sys,
    Common,
    Tenant,
}

impl From<SchemaClassArg> for SchemaClass {
    fn from(arg: SchemaClassArg) -> Self {
        match arg {
            SchemaClassArg::Sys => SchemaClass::Sys,
            SchemaClassArg::Common => SchemaClass::Common,
            SchemaClassArg::Tenant => SchemaClass::Tenant,
        }
    }
}

struct Env {
    db_config: DatabaseConfig,
    control_pool: PgPool,
    connections: Arc<SchemaConnections>,
    registry: TenantRegistry,
}

async fn connect(auto_provision: bool) -> Result<Env, BoxError> {
    let db_config = DatabaseConfig::from_env()?;
    let mut tenancy_config = TenancyConfig::from_env()?;
    tenancy_config.auto_provision = auto_provision;

    let control_pool = db_config
        .control_pool_options()
        .connect_with(db_config.schema_connect_options(SYS_SCHEMA))
        .await?;

    // The registry expects the control schema to exist.
    let ddl = SchemaDdl::new(control_pool.clone());
    if !ddl.create_schema(SYS_SCHEMA).await? {
        return Err("could not create the sys schema".into());
    }
    MigrationRunner::for_class(SchemaClass::Sys)
        .run(&control_pool)
        .await?;

    let connections = Arc::new(SchemaConnections::new(
        Arc::new(PgPoolFactory::new(db_config.clone())),
        tenancy_config.max_cached_pools,
    ));
    let registry = TenantRegistry::new(
        control_pool.clone(),
        connections.clone(),
        TenantRecordCache::default(),
        tenancy_config,
    );

    Ok(Env {
        db_config,
        control_pool,
        connections,
        registry,
    })
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Tenant { command } => run_tenant(command).await,
        Command::Schema { command } => run_schema(command).await,
        Command::Migrate { command } => run_migrate(command).await,
        Command::Setup { command } => run_setup(command).await,
    }
}

async fn run_tenant(command: TenantCommand) -> Result<(), BoxError> {
    match command {
        TenantCommand::Create(args) => {
            let env = connect(!args.no_provision).await?;
            let record = env
                .registry
                .create_tenant(NewTenant {
                    name: args.name,
                    domain: args.domain,
                    tenant_type: args.tenant_type.into(),
                    contact_email: args.email,
                    description: None,
                })
                .await?;
            info!(
                domain = %record.domain,
                schema = %record.schema_name,
                state = %record.provisioning_state,
                "tenant created"
            );
            println!("{}", serde_json::to_string_pretty(&record)?);
            env.connections.close_all().await;
        }
        TenantCommand::Delete { domain, yes } => {
            if !yes {
                return Err(format!(
                    "deleting tenant {domain} drops its schema and all data; re-run with --yes"
                )
                .into());
            }
            let env = connect(false).await?;
            let record = env.registry.get_tenant_by_domain(&domain).await?;
            env.registry.delete_tenant(record.id).await?;
            info!(domain = %domain, "tenant deleted");
            env.connections.close_all().await;
        }
    }
    Ok(())
}

async fn run_schema(command: SchemaCommand) -> Result<(), BoxError> {
    match command {
        SchemaCommand::Create { domain } => {
            let env = connect(false).await?;
            let record = env.registry.provision_tenant(&domain).await?;
            info!(
                domain = %record.domain,
                schema = %record.schema_name,
                state = %record.provisioning_state,
                "schema provisioned"
            );
            env.connections.close_all().await;
        }
    }
    Ok(())
}

async fn run_migrate(command: MigrateCommand) -> Result<(), BoxError> {
    let (args, revert) = match command {
        MigrateCommand::Run(args) => (args, false),
        MigrateCommand::Revert(args) => (args, true),
    };
    let class: SchemaClass = args.class.into();
    let schema = match (&args.schema, class) {
        (Some(name), _) => name.clone(),
        (None, SchemaClass::Sys) => SYS_SCHEMA.to_string(),
        (None, SchemaClass::Common) => COMMON_SCHEMA.to_string(),
        (None, SchemaClass::Tenant) => {
            return Err("--schema is required for the tenant class".into());
        }
    };
    validate_schema_name(&schema)?;

    let env = connect(false).await?;
    let pool = if schema == SYS_SCHEMA {
        env.control_pool.clone()
    } else {
        env.db_config
            .tenant_pool_options()
            .connect_with(env.db_config.schema_connect_options(&schema))
            .await?
    };

    let runner = MigrationRunner::for_class(class);
    if revert {
        let name = runner.revert_last(&pool).await?;
        info!(schema = %schema, script = %name, "reverted migration");
    } else {
        let applied = runner.run(&pool).await?;
        info!(schema = %schema, applied, "migrations complete");
    }
    env.connections.close_all().await;
    Ok(())
}

async fn run_setup(command: SetupCommand) -> Result<(), BoxError> {
    match command {
        SetupCommand::Dev => {
            let env = connect(false).await?;
            // Sys is already bootstrapped by connect(); bring up common too.
            let ddl = SchemaDdl::new(env.control_pool.clone());
            if !ddl.create_schema(COMMON_SCHEMA).await? {
                return Err("could not create the common schema".into());
            }
            let common_pool = env
                .db_config
                .tenant_pool_options()
                .connect_with(env.db_config.schema_connect_options(COMMON_SCHEMA))
                .await?;
            let applied = MigrationRunner::for_class(SchemaClass::Common)
                .run(&common_pool)
                .await?;
            info!(applied, "development environment ready");
            env.connections.close_all().await;
        }
    }
    Ok(())
}
