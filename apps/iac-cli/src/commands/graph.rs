// graph.rs - `iac graph`: show what the provider parsed and indexed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use iac_graph::IndexedGraph;
use iac_runner::ProviderRegistry;
use serde_json::json;

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Directory holding the IaC sources.
    #[arg(short = 'd', long = "directory")]
    pub directory: PathBuf,

    /// Source provider.
    #[arg(long, default_value = "terraform")]
    pub provider: String,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Resource count per type.
fn type_counts(graph: &IndexedGraph) -> BTreeMap<String, usize> {
    graph
        .get_resources_by_type(&[])
        .map(|(name, group)| (name, group.len()))
        .collect()
}

/// Text rendering: type counts, then each resource's relations.
pub fn render_text(graph: &IndexedGraph) -> String {
    let mut out = format!("Resource types ({} resources):\n", graph.len());
    for (name, count) in type_counts(graph) {
        out.push_str(&format!("  {:<56} {}\n", name, count));
    }

    out.push_str(&format!(
        "\nReferences ({} edges):\n",
        graph.references().edge_count()
    ));
    for (_, group) in graph.get_resources_by_type(&[]) {
        for resource in group.iter() {
            let Some(relations) = graph.references().relations(&resource.id) else {
                continue;
            };
            for (related_type, ids) in relations {
                out.push_str(&format!(
                    "  {} -> {}: {}\n",
                    resource.id,
                    related_type,
                    ids.join(", ")
                ));
            }
        }
    }
    out
}

pub fn render_json(graph: &IndexedGraph) -> anyhow::Result<String> {
    let document = json!({
        "resource_count": graph.len(),
        "types": type_counts(graph),
        "references": graph.references(),
    });
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn execute(args: &GraphArgs) -> anyhow::Result<()> {
    let providers = ProviderRegistry::with_defaults();
    let provider = providers.get(&args.provider)?;
    if provider.match_dir(&args.directory)?.is_empty() {
        anyhow::bail!(
            "no {} source files found in {}",
            provider.name(),
            args.directory.display()
        );
    }
    let graph = provider
        .parse(&args.directory)
        .with_context(|| format!("failed to parse {}", args.directory.display()))?;

    if args.json {
        println!("{}", render_json(&graph)?);
    } else {
        print!("{}", render_text(&graph));
    }
    Ok(())
}
