//!
//! teamlens CLI binary
//! -------------------
//! Command-line client for a running teamlens server. Supports a one-shot
//! report run and an interactive interpreter with login/registration,
//! filter listing, report runs and the admin log view.

use std::env;

use anyhow::{Context, Result};

use teamlens::cli::connectivity::HttpSession;
use teamlens::cli::outputformatter::print_report;
use teamlens::cli::{print_usage, run_repl};

fn main() -> Result<()> {
    println!("teamlens command line interface");
    // Initialize tracing subscriber so connection errors are visible on the command line
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut connect_url: Option<String> = None;
    let mut email: Option<String> = None;
    let mut password: Option<String> = None;
    let mut report_agents: Option<String> = None;
    let mut repl = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--connect" => {
                if i + 1 >= args.len() { eprintln!("--connect requires a URL"); print_usage(&program); std::process::exit(2); }
                connect_url = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--email" => {
                if i + 1 >= args.len() { eprintln!("--email requires a value"); print_usage(&program); std::process::exit(2); }
                email = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--password" => {
                if i + 1 >= args.len() { eprintln!("--password requires a value"); print_usage(&program); std::process::exit(2); }
                password = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--report" => {
                if i + 1 >= args.len() { eprintln!("--report requires a comma-separated agent list"); print_usage(&program); std::process::exit(2); }
                report_agents = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--repl" => { repl = true; i += 1; continue; }
            "-h" | "--help" => { print_usage(&program); return Ok(()); }
            other => {
                eprintln!("unknown flag: {}", other);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }

    // Tokio runtime
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    // One-shot report: connect, run, print, and exit unless --repl was asked for.
    if let Some(agents_csv) = report_agents {
        let (Some(url), Some(user), Some(pass)) = (connect_url.clone(), email.clone(), password.clone()) else {
            eprintln!("--report requires --connect, --email and --password");
            std::process::exit(2);
        };
        let agents: Vec<String> = agents_csv.split(',').map(|a| a.trim().to_string()).filter(|a| !a.is_empty()).collect();
        let session = rt
            .block_on(async { HttpSession::connect(&url, &user, &pass).await })
            .context("login failed")?;
        match rt.block_on(async { session.run_report(&agents, None, None).await }) {
            Ok(val) => print_report(&val),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        if !repl { return Ok(()); }
    }

    run_repl(rt, (connect_url, email, password))
}
