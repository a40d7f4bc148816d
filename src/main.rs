use anyhow::{bail, Context, Result};
use cultivation::breakthrough::BreakthroughOutcome;
use cultivation::methods::purchase_cost;
use cultivation::utils::{build_info, logging};
use cultivation::{
    Catalog, CultivationEngine, EngineConfig, FileStore, PlayerRecord, ProgressionState,
    ProgressionStore, SessionStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const USAGE: &str = "\
Usage: cultivation [--catalog <file>] <command> [args]

Commands:
  catalog                        List realms and cultivation methods
  status <user>                  Show a player's progression
  meditate <user> <seconds>      Meditate for a while, then stop
  breakthrough <user>            Attempt a breakthrough
  learn <user> <method_id>       Buy a cultivation method
  upgrade <user> <owned_id>      Upgrade an owned method
  activate <user> <owned_id>     Make an owned method the active one
  --version                      Show version information
  --help                         Show this help message

Environment:
  CULTIVATION_CONFIG             Path to an engine config JSON file
  RUST_LOG                       Log filter (default: info)";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let catalog_path = take_option(&mut args, "--catalog")?;

    match args.first().map(String::as_str) {
        None | Some("--help") | Some("-h") => {
            println!("Cultivation - idle progression engine\n");
            println!("{}", USAGE);
            return Ok(());
        }
        Some("--version") | Some("-v") => {
            println!("{}", build_info::version_line());
            return Ok(());
        }
        _ => {}
    }

    logging::init();

    let config = match std::env::var_os("CULTIVATION_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            EngineConfig::load(&path)
                .with_context(|| format!("reading config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    let catalog = match catalog_path {
        Some(path) => Catalog::load(&path)
            .with_context(|| format!("reading catalog {}", path.display()))?,
        None => Catalog::builtin(),
    };

    if args[0] == "catalog" {
        print_catalog(&catalog);
        return Ok(());
    }

    let store = match &config.save_dir {
        Some(dir) => FileStore::in_dir(dir),
        None => FileStore::new(),
    }
    .context("opening save directory")?;
    let store: Arc<dyn ProgressionStore> = Arc::new(store);

    let user = arg(&args, 1, "user")?;
    onboard(store.as_ref(), &catalog, user)?;

    let engine = CultivationEngine::new(catalog, Arc::clone(&store), config);
    let result = run_command(&engine, &args, user).await;
    engine.shutdown().await;
    result
}

async fn run_command(engine: &CultivationEngine, args: &[String], user: &str) -> Result<()> {
    match args[0].as_str() {
        "status" => {
            let status = engine.status(user).await?;
            print_status(engine.catalog(), &status);
        }
        "meditate" => {
            let seconds: u64 = arg(args, 2, "seconds")?
                .parse()
                .context("seconds must be a whole number")?;
            let before = engine.start_meditation(user).await?;
            println!("Meditating for {}s...", seconds);
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            let status = engine.status(user).await?;
            let after = engine.stop_meditation(user).await?;
            for line in status.log.iter().rev() {
                println!("  {}", line);
            }
            println!(
                "Spirit power {} -> {}, spirit stones {} -> {}",
                before.spirit_power, after.spirit_power, before.spirit_stones, after.spirit_stones
            );
        }
        "breakthrough" => {
            let report = engine.attempt_breakthrough(user).await?;
            let resolution = &report.resolution;
            println!(
                "Rolled {:.1} against {}%",
                resolution.roll, resolution.plan.success_rate
            );
            match &resolution.outcome {
                BreakthroughOutcome::MajorSuccess { new_tier_id } => {
                    let name = engine
                        .catalog()
                        .tier(new_tier_id)
                        .map(|t| t.name.as_str())
                        .unwrap_or(new_tier_id.as_str());
                    println!("Ascended to {}!", name);
                }
                BreakthroughOutcome::MinorSuccess { new_level, .. } => {
                    println!("Reached level {}.", new_level);
                }
                BreakthroughOutcome::Failure {
                    new_level,
                    power_lost,
                    new_bonus,
                } => {
                    println!(
                        "Failed. Fell to level {}, lost {} spirit power, bonus now +{}%.",
                        new_level, power_lost, new_bonus
                    );
                }
            }
        }
        "learn" => {
            let report = engine.purchase_method(user, arg(args, 2, "method_id")?).await?;
            println!(
                "Learned {} for {} stones (owned id {})",
                report.change.method.method_id, report.change.stones_spent, report.change.method.id
            );
        }
        "upgrade" => {
            let report = engine.upgrade_method(user, arg(args, 2, "owned_id")?).await?;
            println!(
                "{} is now level {} ({} stones)",
                report.change.method.method_id,
                report.change.method.current_level,
                report.change.stones_spent
            );
        }
        "activate" => {
            let report = engine.activate_method(user, arg(args, 2, "owned_id")?).await?;
            println!("{} is now active", report.change.method.method_id);
        }
        other => {
            bail!("unknown command: {}\nRun 'cultivation --help' for usage.", other);
        }
    }
    Ok(())
}

/// Unknown players start at the first realm.
fn onboard(store: &dyn ProgressionStore, catalog: &Catalog, user: &str) -> Result<()> {
    if store.load(user)?.is_none() {
        let record = PlayerRecord::new(ProgressionState::new(user, &catalog.first_tier().id));
        store.save_record(&record)?;
        info!(user_id = user, "new cultivator onboarded");
    }
    Ok(())
}

fn take_option(args: &mut Vec<String>, name: &str) -> Result<Option<PathBuf>> {
    let Some(pos) = args.iter().position(|a| a == name) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{} needs a value", name);
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(PathBuf::from(value)))
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    match args.get(index) {
        Some(value) => Ok(value.as_str()),
        None => bail!("missing <{}>\n\n{}", name, USAGE),
    }
}

fn print_catalog(catalog: &Catalog) {
    println!("Realms:");
    for tier in catalog.tiers() {
        println!(
            "  {:>2}. {:<28} {:>12} power{}",
            tier.order_index,
            tier.name,
            tier.spirit_power_required,
            if tier.is_major_tier { "  (major)" } else { "" }
        );
    }
    println!("\nMethods:");
    for def in catalog.methods() {
        println!(
            "  {:<18} {:<10} x{:<4} max lv {:<3} {} stones",
            def.id,
            def.rarity.label(),
            def.base_speed_multiplier,
            def.max_level,
            purchase_cost(def)
        );
    }
}

fn print_status(catalog: &Catalog, status: &SessionStatus) {
    let state = &status.state;
    let realm = catalog
        .tier(&state.tier_id)
        .map(|t| t.name.as_str())
        .unwrap_or(state.tier_id.as_str());
    println!("{} - {} level {}", state.user_id, realm, state.current_level);
    println!(
        "  Spirit power {}   Spirit stones {}   Bonus +{}%",
        state.spirit_power, state.spirit_stones, state.breakthrough_bonus
    );
    println!("  Accrual {}/tick   Phase {:?}", status.accrual_rate, status.phase);
    match &status.breakthrough {
        Some(plan) => println!(
            "  Next breakthrough: {} power ({:.0}%), {}% success",
            plan.required_power, plan.progress_percent, plan.success_rate
        ),
        None => println!("  Peak of the final realm reached"),
    }
    for owned in &status.methods {
        println!(
            "  [{}] {} level {}{}",
            owned.id,
            owned.method_id,
            owned.current_level,
            if owned.is_active { " (active)" } else { "" }
        );
    }
}
