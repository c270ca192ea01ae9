//! Interactive command-line client for a running teamlens server.
//! A connected `HttpSession` is the authenticated state; every data command
//! (`filters`, `report`, `logs`) is refused until `login` succeeds, and
//! `logout` drops back to the anonymous prompt.

pub mod connectivity;
pub mod outputformatter;

use std::io::{self, Write};

use anyhow::Result;

use connectivity::HttpSession;
use outputformatter::{print_log_table, print_report};

pub fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--connect <url>] [--email <e>] [--password <p>] [--repl]\n  {program} --connect <url> --email <e> --password <p> --report \"Agent1,Agent2\"\n\nFlags:\n  --connect <url>          teamlens server base URL (e.g. http://127.0.0.1:7878)\n  --email <e>              Login email\n  --password <p>           Login password\n  --report <agents>        Run a one-shot report for the comma-separated agents, print it and exit\n  --repl                   Start the interactive interpreter (default when no one-shot command given)\n  -h, --help               Show this help\n\nInteractive commands:\n  login <url> <email> <password>      authenticate against a server\n  register <url> <email> <password> <confirm>   create an account, then log in separately\n  logout                              end the session (back to anonymous)\n  status                              show current session info\n  filters [sup1,sup2]                 list selectable supervisors and agents\n  report <agent1,agent2> [from to]    run a report (dates as YYYY-MM-DD)\n  logs [k=v ...] [page N]             admin log page; filters: error_code, agent, supervisor, user_email\n  help                                show this help\n  quit | exit                         leave the interpreter"
    );
}

fn require_session<'a>(session: &'a Option<HttpSession>) -> Option<&'a HttpSession> {
    match session {
        Some(s) => Some(s),
        None => {
            eprintln!("not logged in; use: login <url> <email> <password>");
            None
        }
    }
}

/// Interactive interpreter. `auto` carries optional (url, email, password)
/// from the command line for auto-login.
pub fn run_repl(rt: tokio::runtime::Runtime, auto: (Option<String>, Option<String>, Option<String>)) -> Result<()> {
    let mut session: Option<HttpSession> = None;

    if let (Some(url), Some(email), Some(pass)) = (&auto.0, &auto.1, &auto.2) {
        match rt.block_on(async { HttpSession::connect(url, email, pass).await }) {
            Ok(s) => {
                println!("connected to {}", s.ident());
                session = Some(s);
            }
            Err(e) => eprintln!("auto-login failed: {}", e),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input = String::new();
    println!("teamlens-cli interpreter. Type 'help' for commands.");
    loop {
        input.clear();
        print!("> ");
        let _ = stdout.flush();
        if stdin.read_line(&mut input).is_err() { break; }
        let line = input.trim();
        if line.is_empty() { continue; }
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0].to_lowercase().as_str() {
            "quit" | "exit" => break,
            "help" => print_usage("teamlens_cli"),
            "login" => {
                if parts.len() < 4 {
                    eprintln!("usage: login <url> <email> <password>");
                    continue;
                }
                match rt.block_on(async { HttpSession::connect(parts[1], parts[2], parts[3]).await }) {
                    Ok(s) => {
                        println!("connected to {}", s.ident());
                        session = Some(s);
                    }
                    Err(e) => eprintln!("login failed: {}", e),
                }
            }
            "register" => {
                if parts.len() < 5 {
                    eprintln!("usage: register <url> <email> <password> <confirm>");
                    continue;
                }
                match rt.block_on(async { HttpSession::register(parts[1], parts[2], parts[3], parts[4]).await }) {
                    Ok(()) => println!("Account created. Please log in."),
                    Err(e) => eprintln!("{}", e),
                }
            }
            "logout" => {
                if let Some(s) = session.take() {
                    if let Err(e) = rt.block_on(async { s.logout().await }) {
                        eprintln!("logout: {}", e);
                    }
                    println!("logged out");
                } else {
                    println!("not logged in");
                }
            }
            "status" => {
                match &session {
                    Some(s) => println!("connected: {}", s.ident()),
                    None => println!("anonymous (not logged in)"),
                }
            }
            "filters" => {
                let Some(s) = require_session(&session) else { continue; };
                let sel = parts.get(1).copied();
                match rt.block_on(async { s.filters(sel).await }) {
                    Ok(val) => {
                        let sups = val.get("supervisors").cloned().unwrap_or_default();
                        let agents = val.get("agents").cloned().unwrap_or_default();
                        println!("supervisors: {}", sups);
                        println!("agents:      {}", agents);
                    }
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            "report" => {
                let Some(s) = require_session(&session) else { continue; };
                if parts.len() < 2 {
                    eprintln!("usage: report <agent1,agent2> [from to]");
                    continue;
                }
                let agents: Vec<String> = parts[1].split(',').map(|a| a.trim().to_string()).filter(|a| !a.is_empty()).collect();
                let start = parts.get(2).copied();
                let end = parts.get(3).copied();
                match rt.block_on(async { s.run_report(&agents, start, end).await }) {
                    Ok(val) => print_report(&val),
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            "logs" => {
                let Some(s) = require_session(&session) else { continue; };
                let mut filters: Vec<(String, String)> = Vec::new();
                let mut page: usize = 0;
                let mut page_size: usize = crate::errorlog::DEFAULT_PAGE_SIZE;
                let mut args = parts[1..].iter();
                while let Some(arg) = args.next() {
                    if *arg == "page" {
                        if let Some(n) = args.next().and_then(|v| v.parse::<usize>().ok()) { page = n; }
                        continue;
                    }
                    if let Some((k, v)) = arg.split_once('=') {
                        match k {
                            "error_code" | "agent" | "supervisor" | "user_email" => {
                                filters.push((k.to_string(), v.to_string()));
                            }
                            "page" => { if let Ok(n) = v.parse() { page = n; } }
                            "page_size" => { if let Ok(n) = v.parse() { page_size = n; } }
                            other => eprintln!("unknown filter '{other}' ignored"),
                        }
                    }
                }
                match rt.block_on(async { s.logs(&filters, page, page_size).await }) {
                    Ok(val) => {
                        if !print_log_table(&val) {
                            println!("{}", serde_json::to_string_pretty(&val).unwrap_or_else(|_| val.to_string()));
                        }
                    }
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            other => eprintln!("unknown command '{other}'; type 'help'"),
        }
    }
    Ok(())
}
