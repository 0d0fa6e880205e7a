///! Output formatting for CLI
///!
///! Narration goes through a caller-supplied writer so command handlers can
///! be driven against a buffer as well as stdout.

use crate::federation::{GroupTarget, ListedToken};
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use tabled::{Table, Tabled};
use tokenctl_common::{Cluster, ClusterEntry, FederatedQueryResult, Service};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "yaml" | "yml" => OutputFormat::Yaml,
            _ => OutputFormat::Table,
        }
    }
}

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Service ID")]
    service_id: String,
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&(String, &Service)> for ServiceRow {
    fn from((cluster, service): &(String, &Service)) -> Self {
        Self {
            service_id: service.service_id.clone(),
            cluster: cluster.clone(),
            status: service.status.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// One `show` section: the displayed copy of the token and the services
/// listed under it, each tagged with the cluster running it
pub struct TokenSection<'r> {
    pub heading: String,
    pub entry: &'r ClusterEntry,
    pub services: Vec<(String, &'r Service)>,
}

#[derive(Tabled)]
struct TokenRow {
    #[tabled(rename = "Token")]
    token: String,
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Last Update")]
    last_update: String,
}

impl From<&ListedToken> for TokenRow {
    fn from(listed: &ListedToken) -> Self {
        Self {
            token: listed.summary.token.clone(),
            cluster: listed.cluster.clone(),
            owner: listed.summary.owner.clone().unwrap_or_else(|| "-".to_string()),
            last_update: format_time(listed.summary.last_update_time),
        }
    }
}

fn format_time(time: Option<chrono::DateTime<chrono::Utc>>) -> String {
    time.map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string())
}

/// Write data as pretty-printed JSON
pub fn write_json<T: Serialize>(out: &mut dyn Write, data: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    writeln!(out, "{}", json)?;
    Ok(())
}

/// Write data as YAML
pub fn write_yaml<T: Serialize>(out: &mut dyn Write, data: &T) -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(data)?;
    write!(out, "{}", yaml)?;
    Ok(())
}

/// Write a serializable value in a machine-readable format
pub fn write_structured<T: Serialize>(
    out: &mut dyn Write,
    data: &T,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Yaml => write_yaml(out, data),
        OutputFormat::Json | OutputFormat::Table => write_json(out, data),
    }
}

/// Print the federated token listing
pub fn write_tokens(
    out: &mut dyn Write,
    tokens: &[ListedToken],
    format: OutputFormat,
) -> anyhow::Result<()> {
    if format != OutputFormat::Table {
        return write_structured(out, &tokens, format);
    }

    if tokens.is_empty() {
        writeln!(out, "{}", "No results found".yellow())?;
        return Ok(());
    }

    let rows: Vec<TokenRow> = tokens.iter().map(TokenRow::from).collect();
    writeln!(out, "{}", Table::new(rows))?;
    Ok(())
}

/// Print one section per display target, headed `=== heading / token ===`
pub fn write_token_sections(
    out: &mut dyn Write,
    token_name: &str,
    sections: &[TokenSection<'_>],
    show_services: bool,
) -> anyhow::Result<()> {
    for (index, section) in sections.iter().enumerate() {
        if index > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{}", format!("=== {} / {} ===", section.heading, token_name).bold())?;

        let token = &section.entry.token;
        if let Some(owner) = &token.owner {
            writeln!(out, "Owner: {}", owner)?;
        }
        if let Some(cluster) = &token.cluster {
            writeln!(out, "Cluster: {}", cluster)?;
        }
        writeln!(out, "Last Update: {}", format_time(token.last_update_time))?;
        if let Some(user) = &token.last_update_user {
            writeln!(out, "Last Update User: {}", user)?;
        }
        for (key, value) in &token.extra {
            writeln!(out, "{}: {}", key, value)?;
        }

        if show_services {
            if section.services.is_empty() {
                writeln!(out, "{}", "No services".dimmed())?;
            } else {
                let rows: Vec<ServiceRow> = section.services.iter().map(ServiceRow::from).collect();
                writeln!(out, "{}", Table::new(rows))?;
            }
        }
    }
    Ok(())
}

/// Sections for `show`: one per sync group, headed by the group name.
///
/// The group's primary copy is displayed, with the services of every
/// member holding the token.
pub fn group_sections<'r>(
    targets: &[GroupTarget],
    result: &'r FederatedQueryResult,
) -> Vec<TokenSection<'r>> {
    targets
        .iter()
        .filter_map(|target| {
            let entry = result.get(&target.cluster.name)?;
            Some(TokenSection {
                heading: target.group.clone(),
                entry,
                services: tagged_services(&target.members, result),
            })
        })
        .collect()
}

/// Sections for `show --cluster`: one per queried cluster holding the token
pub fn cluster_sections<'r>(
    clusters: &[Cluster],
    result: &'r FederatedQueryResult,
) -> Vec<TokenSection<'r>> {
    clusters
        .iter()
        .filter_map(|cluster| {
            let entry = result.get(&cluster.name)?;
            Some(TokenSection {
                heading: cluster.name.clone(),
                entry,
                services: tagged_services(std::slice::from_ref(cluster), result),
            })
        })
        .collect()
}

fn tagged_services<'r>(
    clusters: &[Cluster],
    result: &'r FederatedQueryResult,
) -> Vec<(String, &'r Service)> {
    clusters
        .iter()
        .filter_map(|cluster| result.get(&cluster.name).map(|entry| (cluster, entry)))
        .flat_map(|(cluster, entry)| {
            entry
                .services
                .iter()
                .map(move |service| (cluster.name.clone(), service))
        })
        .collect()
}

/// Print a success message with green checkmark
pub fn success(out: &mut dyn Write, message: &str) -> std::io::Result<()> {
    writeln!(out, "{} {}", "✓".green().bold(), message.green())
}

/// Print an info message with blue i
pub fn info(out: &mut dyn Write, message: &str) -> std::io::Result<()> {
    writeln!(out, "{} {}", "ℹ".blue().bold(), message)
}

/// Print a warning message with yellow triangle
pub fn warning(out: &mut dyn Write, message: &str) -> std::io::Result<()> {
    writeln!(out, "{} {}", "⚠".yellow().bold(), message.yellow())
}

/// Print an error message with red X to stderr
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tokenctl_common::{Token, TokenSummary};

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("yml"), OutputFormat::Yaml);
        assert_eq!(OutputFormat::from_str("anything"), OutputFormat::Table);
    }

    #[test]
    fn test_token_section_heading() {
        let entry = ClusterEntry {
            token: Token {
                owner: Some("alice".to_string()),
                ..Token::default()
            },
            etag: None,
            services: vec![Service::new("s-1", "Running")],
        };

        let section = TokenSection {
            heading: "g1".to_string(),
            entry: &entry,
            services: vec![("waiter1".to_string(), &entry.services[0])],
        };

        let mut out = Vec::new();
        write_token_sections(&mut out, "T", &[section], true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("=== g1 / T ==="));
        assert!(text.contains("Owner: alice"));
        assert!(text.contains("s-1"));
        assert!(text.contains("waiter1"));
    }

    #[test]
    fn test_group_section_merges_member_services() {
        let entry = |service_id: &str, updated_ms: i64| ClusterEntry {
            token: Token {
                last_update_time: Utc.timestamp_millis_opt(updated_ms).single(),
                ..Token::default()
            },
            etag: None,
            services: vec![Service::new(service_id, "Running")],
        };
        let mut result = FederatedQueryResult::new();
        result.insert("waiter1", entry("s-1", 1_000));
        result.insert("waiter2", entry("s-2", 2_000));

        let waiter1 = Cluster::new("waiter1", "http://a").with_sync_group("g");
        let waiter2 = Cluster::new("waiter2", "http://b").with_sync_group("g");
        let target = GroupTarget {
            group: "g".to_string(),
            cluster: waiter2.clone(),
            members: vec![waiter1, waiter2],
        };

        let sections = group_sections(&[target], &result);
        assert_eq!(sections.len(), 1);
        let tagged: Vec<(&str, &str)> = sections[0]
            .services
            .iter()
            .map(|(cluster, service)| (cluster.as_str(), service.service_id.as_str()))
            .collect();
        assert_eq!(tagged, vec![("waiter1", "s-1"), ("waiter2", "s-2")]);
    }

    #[test]
    fn test_tokens_json_listing() {
        let tokens = vec![ListedToken {
            cluster: "waiter1".to_string(),
            summary: TokenSummary {
                token: "T".to_string(),
                ..TokenSummary::default()
            },
        }];

        let mut out = Vec::new();
        write_tokens(&mut out, &tokens, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[0]["cluster"], "waiter1");
        assert_eq!(parsed[0]["token"], "T");
    }
}
