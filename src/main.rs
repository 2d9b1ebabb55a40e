use clap::Parser;
use festreg::application::checkin::CheckInVerifier;
use festreg::application::ledger::RegistrationLedger;
use festreg::application::membership::MembershipBroker;
use festreg::domain::ports::{
    EventStoreRef, PaymentGatewayRef, ProfileStoreRef, RegistrationStoreRef, TeamStoreRef,
};
use festreg::infrastructure::in_memory::{
    InMemoryEventStore, InMemoryProfileStore, InMemoryRegistrationStore, InMemoryTeamStore,
};
use festreg::infrastructure::mock_gateway::MockGateway;
use festreg::interfaces::report::ReportWriter;
use festreg::interfaces::script::ScriptRunner;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input action script (JSON lines)
    script: PathBuf,

    /// Secret used to verify simulated gateway webhooks
    #[arg(long, default_value = "dev-webhook-secret")]
    webhook_secret: String,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

struct Stores {
    profiles: ProfileStoreRef,
    teams: TeamStoreRef,
    events: EventStoreRef,
    registrations: RegistrationStoreRef,
}

fn in_memory_stores() -> Stores {
    Stores {
        profiles: Arc::new(InMemoryProfileStore::new()),
        teams: Arc::new(InMemoryTeamStore::new()),
        events: Arc::new(InMemoryEventStore::new()),
        registrations: Arc::new(InMemoryRegistrationStore::new()),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn rocksdb_stores(path: &std::path::Path) -> festreg::error::Result<Stores> {
    let store = festreg::infrastructure::rocksdb::RocksDbStore::open(path)?;
    Ok(Stores {
        profiles: Arc::new(store.clone()),
        teams: Arc::new(store.clone()),
        events: Arc::new(store.clone()),
        registrations: Arc::new(store),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    #[cfg(feature = "storage-rocksdb")]
    let stores = match &cli.db_path {
        Some(path) => rocksdb_stores(path).into_diagnostic()?,
        None => in_memory_stores(),
    };
    #[cfg(not(feature = "storage-rocksdb"))]
    let stores = in_memory_stores();

    let gateway: PaymentGatewayRef = Arc::new(MockGateway::new());

    let broker = MembershipBroker::new(stores.profiles.clone(), stores.teams.clone());
    let ledger = RegistrationLedger::new(
        stores.profiles.clone(),
        stores.teams.clone(),
        stores.events.clone(),
        stores.registrations.clone(),
        gateway,
    );
    let verifier = CheckInVerifier::new(
        stores.registrations.clone(),
        stores.teams.clone(),
        stores.profiles.clone(),
    );

    let runner = ScriptRunner::new(
        broker,
        ledger,
        verifier,
        stores.profiles.clone(),
        stores.teams.clone(),
        stores.events.clone(),
        stores.registrations.clone(),
        cli.webhook_secret,
    );

    let file = File::open(&cli.script).into_diagnostic()?;
    runner.run(BufReader::new(file)).await.into_diagnostic()?;

    let teams = stores.teams.all().await.into_diagnostic()?;
    let registrations = stores.registrations.all().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer
        .write_report(teams, registrations)
        .into_diagnostic()?;

    Ok(())
}
