//! Static access mapping: supervisor email -> set of agent names, plus the
//! admin allow-list. Loaded once per process from `EMAIL_TO_AGENTS.json`;
//! read-only afterwards (reload requires restart). An unmapped authenticated
//! user is "authorized for nothing", never an error.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::AppError;
use crate::security::normalize_email;

#[derive(Debug, Clone, Default)]
pub struct AccessMap {
    map: BTreeMap<String, BTreeSet<String>>,
    admins: BTreeSet<String>,
    agent_to_supervisor: BTreeMap<String, String>,
}

impl AccessMap {
    /// Load the mapping file. A missing or unreadable file is a fatal
    /// configuration error (`E9001`), mirroring startup behavior.
    pub fn load<P: AsRef<Path>>(path: P, admin_emails: &[String]) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|_| AppError::config("E9001".to_string(), format!("Missing {}.", crate::config::EMAIL_TO_AGENTS_FILE)))?;
        let parsed: BTreeMap<String, Vec<String>> = serde_json::from_str(&raw)
            .map_err(|e| AppError::config("E9001".to_string(), format!("Unreadable {}: {e}", crate::config::EMAIL_TO_AGENTS_FILE)))?;
        Ok(Self::from_map(parsed, admin_emails))
    }

    pub fn from_map(map: BTreeMap<String, Vec<String>>, admin_emails: &[String]) -> Self {
        let mut normalized: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut agent_to_supervisor: BTreeMap<String, String> = BTreeMap::new();
        for (email, agents) in map {
            let email = normalize_email(&email);
            let set: BTreeSet<String> = agents.into_iter().collect();
            for agent in &set {
                // First mapping wins when an agent appears under two supervisors
                agent_to_supervisor.entry(agent.clone()).or_insert_with(|| email.clone());
            }
            normalized.insert(email, set);
        }
        let admins = admin_emails.iter().map(|e| normalize_email(e)).collect();
        Self { map: normalized, admins, agent_to_supervisor }
    }

    /// Mapped agent set for an email; empty when unmapped.
    pub fn agents_for(&self, email: &str) -> BTreeSet<String> {
        self.map.get(&normalize_email(email)).cloned().unwrap_or_default()
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admins.contains(&normalize_email(email))
    }

    /// True when the email may register: it is mapped or on the admin list.
    pub fn is_known(&self, email: &str) -> bool {
        let email = normalize_email(email);
        self.map.contains_key(&email) || self.admins.contains(&email)
    }

    /// The agent set a session may see: exactly the mapping entry for
    /// supervisors, the union of all mapped agents for admins.
    pub fn visible_agents(&self, email: &str) -> BTreeSet<String> {
        if self.is_admin(email) { self.all_agents() } else { self.agents_for(email) }
    }

    pub fn supervisors(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    pub fn all_agents(&self) -> BTreeSet<String> {
        self.map.values().flat_map(|s| s.iter().cloned()).collect()
    }

    /// Union of agents under the selected supervisors (the filter cascade).
    pub fn agents_of_supervisors(&self, selection: &[String]) -> BTreeSet<String> {
        let wanted: BTreeSet<String> = selection.iter().map(|s| normalize_email(s)).collect();
        self.map
            .iter()
            .filter(|(sup, _)| wanted.contains(*sup))
            .flat_map(|(_, agents)| agents.iter().cloned())
            .collect()
    }

    pub fn supervisor_of_agent(&self, agent: &str) -> Option<&str> {
        self.agent_to_supervisor.get(agent).map(|s| s.as_str())
    }

    /// All mapped agent names, used to attribute log lines.
    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agent_to_supervisor.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AccessMap {
        let mut m = BTreeMap::new();
        m.insert("a@org.com".to_string(), vec!["Agent1".to_string(), "Agent2".to_string()]);
        m.insert("c@org.com".to_string(), vec!["Agent3".to_string()]);
        AccessMap::from_map(m, &["root@org.com".to_string()])
    }

    #[test]
    fn mapped_email_sees_exactly_its_agents() {
        let acc = sample();
        let agents = acc.agents_for("a@org.com");
        assert_eq!(agents, BTreeSet::from(["Agent1".to_string(), "Agent2".to_string()]));
    }

    #[test]
    fn unmapped_email_gets_empty_set_not_error() {
        let acc = sample();
        assert!(acc.agents_for("b@org.com").is_empty());
        assert!(acc.visible_agents("b@org.com").is_empty());
    }

    #[test]
    fn admin_sees_union_of_all_agents() {
        let acc = sample();
        assert!(acc.is_admin("root@org.com"));
        assert_eq!(acc.visible_agents("root@org.com").len(), 3);
        // but an admin has no mapping entry of their own
        assert!(acc.agents_for("root@org.com").is_empty());
    }

    #[test]
    fn supervisor_visible_set_is_never_a_superset() {
        let acc = sample();
        let visible = acc.visible_agents("c@org.com");
        assert_eq!(visible, BTreeSet::from(["Agent3".to_string()]));
        assert!(!visible.contains("Agent1"));
    }

    #[test]
    fn filter_cascade_unions_selected_supervisors() {
        let acc = sample();
        let sel = vec!["a@org.com".to_string(), "c@org.com".to_string()];
        assert_eq!(acc.agents_of_supervisors(&sel).len(), 3);
        let sel = vec!["c@org.com".to_string()];
        assert_eq!(acc.agents_of_supervisors(&sel), BTreeSet::from(["Agent3".to_string()]));
    }

    #[test]
    fn agent_attribution_and_registration_gate() {
        let acc = sample();
        assert_eq!(acc.supervisor_of_agent("Agent3"), Some("c@org.com"));
        assert_eq!(acc.supervisor_of_agent("Nobody"), None);
        assert!(acc.is_known("a@org.com"));
        assert!(acc.is_known("ROOT@org.com"));
        assert!(!acc.is_known("b@org.com"));
    }

    #[test]
    fn missing_mapping_file_is_fatal_config_error() {
        let err = AccessMap::load("/definitely/not/here.json", &[]).unwrap_err();
        assert_eq!(err.code_str(), "E9001");
    }
}
