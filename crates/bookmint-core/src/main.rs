use anyhow::{bail, Context, Result};
use bookmint_core::simulator::{run_simulator, SimulatorConfig};
use bookmint_core::EngineConfig;
use bookmint_primitives::{merkle, Hash32, Identity, MembershipTree};
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("bookmint")
        .version(bookmint_primitives::VERSION)
        .about("Phased, capped issuance of library-bound tokens")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("tree")
                .about("Build a whitelist tree and print its root and proofs as JSON")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("File with one hex identity per line"),
                ),
        )
        .subcommand(
            Command::new("verify")
                .about("Check a whitelist proof; exits 0 when valid")
                .arg(
                    Arg::new("root")
                        .long("root")
                        .required(true)
                        .value_parser(value_parser!(Hash32))
                        .help("Committed root (hex)"),
                )
                .arg(
                    Arg::new("identity")
                        .long("identity")
                        .required(true)
                        .value_parser(value_parser!(Identity))
                        .help("Member identity (hex)"),
                )
                .arg(
                    Arg::new("proof")
                        .long("proof")
                        .value_delimiter(',')
                        .value_parser(value_parser!(Hash32))
                        .action(ArgAction::Append)
                        .help("Sibling hashes, comma separated"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run a seeded random workload and check invariants")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("requests")
                        .long("requests")
                        .default_value("1000")
                        .value_parser(value_parser!(u64))
                        .help("Number of simulated steps"),
                )
                .arg(
                    Arg::new("max-supply")
                        .long("max-supply")
                        .value_parser(value_parser!(u64))
                        .help("Override the configured supply cap"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Engine configuration (TOML)"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop on the first violation"),
                ),
        )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("tree", args)) => {
            let input = args
                .get_one::<PathBuf>("input")
                .context("--input is required")?;
            tree(input)
        }
        Some(("verify", args)) => {
            let root = *args.get_one::<Hash32>("root").context("--root is required")?;
            let identity = *args
                .get_one::<Identity>("identity")
                .context("--identity is required")?;
            let proof: Vec<Hash32> = args
                .get_many::<Hash32>("proof")
                .map(|values| values.copied().collect())
                .unwrap_or_default();

            let valid = merkle::verify_member(&proof, root, &identity);
            println!("{}", if valid { "valid" } else { "invalid" });
            std::process::exit(if valid { 0 } else { 1 });
        }
        Some(("simulate", args)) => {
            let mut config = SimulatorConfig::default();
            if let Some(path) = args.get_one::<PathBuf>("config") {
                let engine = EngineConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?;
                config = config.with_engine(engine);
            }
            if let Some(max_supply) = args.get_one::<u64>("max-supply") {
                config = config.with_max_supply(*max_supply);
            }
            let seed = args.get_one::<u64>("seed").copied().unwrap_or(42);
            let requests = args.get_one::<u64>("requests").copied().unwrap_or(1000);
            config = config.with_seed(seed).with_requests(requests);
            config.stop_on_first_violation = args.get_flag("stop-on-violation");

            let report = run_simulator(config);
            println!("{}", report.generate_text());
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        _ => bail!("unknown command"),
    }
}

fn tree(input: &Path) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;

    let mut members = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let identity: Identity = line
            .parse()
            .with_context(|| format!("{}:{}: bad identity", input.display(), line_no + 1))?;
        members.push(identity);
    }

    let tree = MembershipTree::from_members(members);
    let proofs: serde_json::Map<String, serde_json::Value> = tree
        .members()
        .iter()
        .map(|member| {
            let proof = tree.proof_for(member).unwrap_or_default();
            (member.to_string(), serde_json::to_value(proof).unwrap_or_default())
        })
        .collect();

    let output = serde_json::json!({
        "root": tree.root(),
        "members": tree.len(),
        "proofs": proofs,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
