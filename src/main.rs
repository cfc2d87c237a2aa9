use anyhow::{Context, Result};
use clap::Parser;
use sftp_stress::{
    cli::Cli,
    config::RunConfig,
    console::ConsoleReporter,
    ssh::SshConnector,
    stress::StressTest,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    // 标准输出只留给事件和汇总（--events-json 时为纯 NDJSON）
    eprintln!("SFTP Stress v0.1.0");
    eprintln!("Target: {}@{}:{}", cli.username, cli.host, cli.port);

    let config = RunConfig::from_cli(&cli)?;
    let test = StressTest::new(config, SshConnector);

    let cancel = test.cancellation_token();
    ctrlc::set_handler(move || {
        if !cancel.is_canceled() {
            eprintln!("SFTP stress test canceled by user.");
            eprintln!("Uploads already in flight may still finish before the run stops.");
        }
        cancel.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let run = test.spawn()?;
    let mut reporter = if cli.events_json {
        None
    } else {
        Some(ConsoleReporter::new())
    };

    for event in run.events() {
        match reporter.as_mut() {
            Some(reporter) => reporter.handle(&event),
            None => println!("{}", serde_json::to_string(&event)?),
        }
    }

    let summary = match run.join() {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("\n❌ Stress test failed: {}\n", e);
            std::process::exit(1);
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if summary.all_succeeded() {
        if !cli.events_json {
            println!("\n✅ {}\n", summary.headline());
        }
    } else {
        eprintln!(
            "\n❌ {} ({} succeeded, {} failed)\n",
            summary.headline(),
            summary.successes,
            summary.failures
        );
        std::process::exit(1);
    }

    Ok(())
}
