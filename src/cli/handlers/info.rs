// src/cli/handlers/info.rs

use crate::{
    cli::{args::InfoArgs, dispatcher::HandlerFuture},
    core::environment::CommandEnvironment,
    models::{InfoGroup, InfoItem},
};
use anyhow::Result;
use clap::Parser;
use colored::*;
use std::collections::BTreeMap;

pub fn handle(args: Vec<String>, env: &CommandEnvironment) -> HandlerFuture<'_> {
    Box::pin(run(args, env))
}

async fn run(args: Vec<String>, env: &CommandEnvironment) -> Result<()> {
    let info_args = InfoArgs::try_parse_from(&args)?;

    env.tasks().next("Gathering environment info");
    let info = env.get_info().await;
    env.tasks().end();

    if info_args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print!("{}", render(&info));
    }
    Ok(())
}

/// Renders items grouped in group order, keys aligned per group.
fn render(info: &[InfoItem]) -> String {
    let mut groups: BTreeMap<InfoGroup, Vec<&InfoItem>> = BTreeMap::new();
    for item in info {
        groups.entry(item.group).or_default().push(item);
    }

    let mut out = String::new();
    for (group, items) in groups {
        out.push_str(&format!("\n{}:\n\n", capitalize(&group.to_string()).bold()));

        let width = items.iter().map(|i| label(i).len()).max().unwrap_or(0);
        for item in items {
            let value = match &item.path {
                Some(path) => format!("{} ({})", item.value, path.dimmed()),
                None => item.value.clone(),
            };
            out.push_str(&format!("   {:<width$} : {}\n", label(item), value, width = width));
        }
    }
    out
}

fn label(item: &InfoItem) -> &str {
    item.flair.as_deref().unwrap_or(&item.key)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_groups_in_order() {
        colored::control::set_override(false);
        let info = vec![
            InfoItem::new(InfoGroup::Project, "name", "MyApp"),
            InfoItem::new(InfoGroup::Ionic, "ionic", "4.0.0").with_flair("Ionic CLI").with_path("/opt/ionic"),
            InfoItem::new(InfoGroup::System, "NodeJS", "v10.0.0"),
            InfoItem::new(InfoGroup::System, "OS", "Linux 6.1"),
        ];

        let out = render(&info);
        let ionic = out.find("Ionic:").unwrap();
        let system = out.find("System:").unwrap();
        let project = out.find("Project:").unwrap();
        assert!(ionic < system && system < project);
        assert!(out.contains("   Ionic CLI : 4.0.0 (/opt/ionic)"));
        assert!(out.contains("   NodeJS : v10.0.0"));
        assert!(out.contains("   OS     : Linux 6.1"));
    }
}
