use serde_json::Value;

use terminal_size::{terminal_size, Height, Width};

// Render an admin log page as an ASCII table.
// Returns true if a table was printed (i.e., entries were present), false otherwise.
pub fn print_log_table(val: &Value) -> bool {
    let Some(entries) = val.get("entries").and_then(|e| e.as_array()) else { return false; };
    if entries.is_empty() {
        println!("No log data available.");
        return true;
    }
    let cols = ["timestamp", "level", "code", "agent", "supervisor", "user", "message"];
    let headers: Vec<String> = cols.iter().map(|c| c.to_string()).collect();
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| cols.iter().map(|c| to_cell_string(e.get(*c).unwrap_or(&Value::Null))).collect())
        .collect();
    print_table(&headers, &rows);
    let page = val.get("page").and_then(|p| p.as_u64()).unwrap_or(0);
    println!("rows: {}, page: {}", rows.len(), page);
    true
}

// Render a report: optional team summary first, then one block per agent.
pub fn print_report(val: &Value) {
    let Some(report) = val.get("report") else {
        println!("{}", serde_json::to_string_pretty(val).unwrap_or_else(|_| val.to_string()));
        return;
    };
    if let Some(team) = report.get("team_summary").and_then(|t| t.as_str()) {
        println!("== Team Summary ==");
        println!("{}\n", team);
    }
    if let Some(agents) = report.get("agents").and_then(|a| a.as_array()) {
        for agent in agents {
            let name = agent.get("name").and_then(|n| n.as_str()).unwrap_or("?");
            println!("== {} ==", name);
            if let Some(stats) = agent.get("stat_block").and_then(|s| s.as_str()) {
                println!("{}", stats);
            }
            if let Some(summary) = agent.get("summary").and_then(|s| s.as_str()) {
                println!("\n{}\n", summary);
            }
        }
    }
}

fn print_table(headers: &[String], rows: &[Vec<String>]) {
    // Cap column widths so the table fits the terminal
    let max_col_width: usize = (get_terminal_width() / headers.len().max(1)).max(8);
    let mut widths: Vec<usize> = headers.iter().map(|s| s.len().min(max_col_width)).collect();
    for r in rows {
        for (i, cell) in r.iter().enumerate().take(headers.len()) {
            let w = display_len(cell);
            if w > widths[i] { widths[i] = w.min(max_col_width); }
        }
    }
    let sep = build_separator(&widths);
    println!("{}", sep);
    println!("{}", build_row(headers, &widths));
    println!("{}", sep);
    for r in rows {
        println!("{}", build_row(r, &widths));
    }
    println!("{}", sep);
}

fn to_cell_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        // keep objects/arrays compact
        other => other.to_string(),
    }
}

fn display_len(s: &str) -> usize { s.chars().count() }

fn get_terminal_width() -> usize {
    let size = terminal_size();
    if let Some((Width(w), Height(_h))) = size {
        return (w.saturating_sub(4)) as usize;
    }
    80
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let (text, align_right) = (truncate(&cell, *w), is_numeric_like(&cell));
        s.push(' ');
        if align_right {
            let pad = w.saturating_sub(display_len(&text));
            s.push_str(&" ".repeat(pad));
            s.push_str(&text);
        } else {
            s.push_str(&text);
            let pad = w.saturating_sub(display_len(&text));
            s.push_str(&" ".repeat(pad));
        }
        s.push(' ');
        s.push('|');
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    let take = max - 1;
    s.chars().take(take).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    // crude detection for aligning numbers to right
    let st = s.trim();
    if st.is_empty() { return false; }
    let mut has_digit = false;
    for ch in st.chars() {
        if ch.is_ascii_digit() { has_digit = true; continue; }
        if ".-+eE,_".contains(ch) { continue; }
        return false;
    }
    has_digit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_detection() {
        assert!(is_numeric_like("93.46"));
        assert!(is_numeric_like("-2"));
        assert!(!is_numeric_like("Agent1"));
        assert!(!is_numeric_like(""));
    }

    #[test]
    fn truncation_keeps_width() {
        assert_eq!(truncate("short", 10), "short");
        let t = truncate("a-very-long-cell-value", 8);
        assert_eq!(t.chars().count(), 8);
        assert!(t.ends_with('…'));
    }

    #[test]
    fn rows_and_separators_line_up() {
        let widths = vec![4, 6];
        let sep = build_separator(&widths);
        let row = build_row(&["ab".to_string(), "123".to_string()], &widths);
        assert_eq!(sep.chars().count(), row.chars().count());
    }
}
